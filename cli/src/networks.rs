//! Network profiles: node endpoints and truffle network ids.

use std::fmt;

use anyhow::{bail, Result};
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Network {
    Mainnet,
    Ropsten,
    Rinkeby,
    Kovan,
    Goerli,
    /// A node on localhost:8545.
    Development,
    /// A node on `TEST_SERVER`:8545.
    Testing,
}

/// Where to send queries and where to open subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub http: String,
    pub ws: String,
}

impl Network {
    /// Key into a truffle artifact's `networks` map.
    pub fn network_id(self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Ropsten => 3,
            Network::Rinkeby => 4,
            Network::Kovan => 42,
            Network::Goerli => 5,
            Network::Development | Network::Testing => 1,
        }
    }

    fn infura_name(self) -> Option<&'static str> {
        match self {
            Network::Mainnet => Some("mainnet"),
            Network::Ropsten => Some("ropsten"),
            Network::Rinkeby => Some("rinkeby"),
            Network::Kovan => Some("kovan"),
            Network::Goerli => Some("goerli"),
            Network::Development | Network::Testing => None,
        }
    }

    /// Public networks go through Infura and need a project id; `testing`
    /// needs the test server's host.
    pub fn endpoints(
        self,
        infura_project_id: Option<&str>,
        test_server: Option<&str>,
    ) -> Result<Endpoints> {
        if let Some(name) = self.infura_name() {
            let Some(id) = infura_project_id.filter(|id| !id.is_empty()) else {
                bail!("INFURA_PROJECT_ID is required for network '{self}'");
            };
            return Ok(Endpoints {
                http: format!("https://{name}.infura.io/v3/{id}"),
                ws: format!("wss://{name}.infura.io/ws/v3/{id}"),
            });
        }

        let host = match self {
            Network::Testing => match test_server.filter(|h| !h.is_empty()) {
                Some(host) => host,
                None => bail!("TEST_SERVER is required for network 'testing'"),
            },
            _ => "localhost",
        };
        Ok(Endpoints {
            http: format!("http://{host}:8545/"),
            ws: format!("ws://{host}:8545/"),
        })
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{self:?}"),
        }
    }
}
