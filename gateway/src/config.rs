use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}
