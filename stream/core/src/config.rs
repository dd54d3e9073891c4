//! Network endpoint configuration for the generator, loadable from a TOML
//! file as an alternative to the six command-line flags.

use crate::{GenError, GenResult};
use serde_derive::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct NetConfig {
    pub dst_mac: Option<String>,
    pub src_mac: Option<String>,
    pub dst_ip: Option<String>,
    pub src_ip: Option<String>,
    pub dst_port: Option<u16>,
    pub src_port: Option<u16>,
}

impl NetConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> GenResult<NetConfig> {
        let path = path.as_ref();
        serdeconv::from_toml_file(path).map_err(|err| {
            GenError::InvalidArgument(format!("{}: {}", path.display(), err))
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> GenResult<()> {
        let path = path.as_ref();
        serdeconv::to_toml_file(self, path).map_err(|err| {
            GenError::InvalidArgument(format!("{}: {}", path.display(), err))
        })
    }

    /// A filled-in starting point for a new deployment.
    pub fn template() -> NetConfig {
        NetConfig {
            dst_mac: Some("02:00:00:00:00:01".to_string()),
            src_mac: Some("02:00:00:00:00:02".to_string()),
            dst_ip: Some("10.0.0.1".to_string()),
            src_ip: Some("10.0.0.2".to_string()),
            dst_port: Some(26400),
            src_port: Some(26401),
        }
    }
}
