use std::error::Error;
use std::fmt;
use std::str::FromStr;

#[derive(Debug)]
pub struct ConfigError {
    pub reason: String,
}

impl ConfigError {
    pub fn new(reason: String) -> Self {
        ConfigError { reason }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid router config: {}", self.reason)
    }
}

impl Error for ConfigError {}

/// Commercial relationship of a neighbor session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    Cust,
    Peer,
    Prov,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Relation::Cust => "cust",
            Relation::Peer => "peer",
            Relation::Prov => "prov",
        };
        write!(f, "{}", word)
    }
}

impl FromStr for Relation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cust" => Ok(Relation::Cust),
            "peer" => Ok(Relation::Peer),
            "prov" => Ok(Relation::Prov),
            _ => Err(ConfigError::new(format!("unknown relation '{}'", s))),
        }
    }
}

/// One neighbor session: the socket address it lives on and our
/// relationship to it
#[derive(Clone, Debug)]
pub struct NeighborConfig {
    pub addr: String,
    pub relation: Relation,
}

impl FromStr for NeighborConfig {
    type Err = ConfigError;

    /// Parse a startup descriptor of the form `<address>-<relation>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, relation) = s
            .rsplit_once('-')
            .ok_or_else(|| ConfigError::new(format!("bad neighbor descriptor '{}'", s)))?;
        if addr.is_empty() {
            return Err(ConfigError::new(format!("bad neighbor descriptor '{}'", s)));
        }
        Ok(NeighborConfig {
            addr: addr.to_string(),
            relation: relation.parse()?,
        })
    }
}

impl fmt::Display for NeighborConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.addr, self.relation)
    }
}

#[derive(Clone, Debug)]
pub struct RouterConfig {
    pub asn: u32,
    pub neighbors: Vec<NeighborConfig>,
}

impl RouterConfig {
    pub fn new(asn: u32, descriptors: &[String]) -> Result<Self, ConfigError> {
        let neighbors = descriptors
            .iter()
            .map(|d| d.parse())
            .collect::<Result<Vec<NeighborConfig>, ConfigError>>()?;
        if neighbors.is_empty() {
            return Err(ConfigError::new("no neighbors configured".to_string()));
        }
        Ok(RouterConfig { asn, neighbors })
    }

    pub fn relation_of(&self, addr: &str) -> Option<Relation> {
        self.neighbors
            .iter()
            .find(|n| n.addr == addr)
            .map(|n| n.relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_neighbor() {
        let neighbor: NeighborConfig = "192.168.0.2-cust".parse().unwrap();
        assert_eq!(neighbor.addr, "192.168.0.2");
        assert_eq!(neighbor.relation, Relation::Cust);

        let neighbor: NeighborConfig = "10.0.4.2-prov".parse().unwrap();
        assert_eq!(neighbor.addr, "10.0.4.2");
        assert_eq!(neighbor.relation, Relation::Prov);
    }

    #[test]
    fn test_parse_neighbor_errors() {
        assert!("192.168.0.2".parse::<NeighborConfig>().is_err());
        assert!("192.168.0.2-transit".parse::<NeighborConfig>().is_err());
        assert!("-cust".parse::<NeighborConfig>().is_err());
    }

    #[test]
    fn test_router_config() {
        let descriptors = vec![
            "1.2.3.2-cust".to_string(),
            "5.6.7.2-peer".to_string(),
        ];
        let config = RouterConfig::new(7, &descriptors).unwrap();
        assert_eq!(config.asn, 7);
        assert_eq!(config.relation_of("1.2.3.2"), Some(Relation::Cust));
        assert_eq!(config.relation_of("5.6.7.2"), Some(Relation::Peer));
        assert_eq!(config.relation_of("9.9.9.9"), None);

        assert!(RouterConfig::new(7, &[]).is_err());
        assert!(RouterConfig::new(7, &["1.2.3.2".to_string()]).is_err());
    }
}
