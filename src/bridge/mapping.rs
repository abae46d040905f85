//! M17 <-> AX.25 callsign mapping table

use heapless::Vec;
use log::debug;

use crate::ax25::Address;
use crate::config::bridge::MAX_MAPPINGS;
use crate::error::{Error, Result};
use crate::m17::callsign::{self, Callsign};

/// One mapping entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mapping {
    m17: Callsign,
    ax25: Address,
    active: bool,
}

impl Mapping {
    /// M17 callsign (uppercase)
    #[must_use]
    pub fn m17(&self) -> &str {
        &self.m17
    }

    /// AX.25 address
    #[must_use]
    pub const fn ax25(&self) -> &Address {
        &self.ax25
    }

    /// Whether lookups see this entry
    #[must_use]
    pub const fn active(&self) -> bool {
        self.active
    }
}

/// Fixed-capacity mapping table; M17 callsigns are unique
#[derive(Clone, Debug, Default)]
pub struct MappingTable {
    entries: Vec<Mapping, MAX_MAPPINGS>,
}

impl MappingTable {
    /// Empty table
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add an active mapping
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an invalid callsign or SSID, or an M17
    ///   callsign already present.
    /// - `ResourceExhausted` when the table is full.
    pub fn add(&mut self, m17: &str, ax25: &str, ssid: u8) -> Result<()> {
        let m17 = callsign::normalize(m17)?;
        let ax25 = Address::new(ax25, ssid)?;
        if self.position(&m17).is_some() {
            return Err(Error::InvalidArgument("m17 callsign already mapped"));
        }
        debug!("bridge: map {m17} <-> {ax25}");
        self.entries
            .push(Mapping {
                m17,
                ax25,
                active: true,
            })
            .map_err(|_| Error::ResourceExhausted("mapping table full"))
    }

    /// Remove a mapping, keeping the order of the rest
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if no mapping has this M17 callsign.
    pub fn remove(&mut self, m17: &str) -> Result<Mapping> {
        let index = self
            .position(m17)
            .ok_or(Error::InvalidArgument("mapping not found"))?;
        Ok(self.entries.remove(index))
    }

    /// Enable or disable a mapping without removing it
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if no mapping has this M17 callsign.
    pub fn set_active(&mut self, m17: &str, active: bool) -> Result<()> {
        let index = self
            .position(m17)
            .ok_or(Error::InvalidArgument("mapping not found"))?;
        self.entries[index].active = active;
        Ok(())
    }

    /// Active mapping for an M17 callsign
    #[must_use]
    pub fn find(&self, m17: &str) -> Option<&Mapping> {
        self.position(m17)
            .map(|i| &self.entries[i])
            .filter(|m| m.active)
    }

    /// Active mapping for an AX.25 station
    #[must_use]
    pub fn find_by_ax25(&self, ax25: &Address) -> Option<&Mapping> {
        self.entries
            .iter()
            .find(|m| m.active && m.ax25.same_station(ax25))
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Mapping> {
        self.entries.iter()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, m17: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|m| m.m17.eq_ignore_ascii_case(m17.trim()))
    }
}
