//! Content domains that own cache namespaces.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the independent CRUD modules sitting on top of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Schemes, subjects and study resources
    Academics,
    Events,
    Projects,
    /// Albums and photos
    Gallery,
    Alumni,
    /// Jobs, internships and certificate programmes
    Careers,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::Academics,
        Domain::Events,
        Domain::Projects,
        Domain::Gallery,
        Domain::Alumni,
        Domain::Careers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Academics => "academics",
            Domain::Events => "events",
            Domain::Projects => "projects",
            Domain::Gallery => "gallery",
            Domain::Alumni => "alumni",
            Domain::Careers => "careers",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown domain: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_parse_roundtrip() {
        for domain in Domain::ALL {
            assert_eq!(domain.as_str().parse::<Domain>().unwrap(), domain);
        }
        assert_eq!(" Gallery ".parse::<Domain>().unwrap(), Domain::Gallery);
        assert!("placements".parse::<Domain>().is_err());
    }
}
