//! Node ID derivation.
//!
//! A node ID distinguishes concurrently running sequencers so their ID
//! streams do not collide. Without a coordination service the best a process
//! can do on its own is derive the ID from something host-specific: the
//! hardware addresses of its network interfaces. The same host with the same
//! interfaces therefore gets the same node ID across restarts. Two hosts may
//! still fold onto the same ID, so this is not a collision-proof allocation.

use core::fmt::Write as _;

use mac_address::MacAddressIterator;
use rand::Rng;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{Error, Result, SequencerId};

/// A 48-bit hardware (MAC) address.
pub type HardwareAddress = [u8; 6];

/// Lists the hardware addresses of the host's network interfaces, in
/// enumeration order.
pub trait InterfaceSource {
    /// Returns one address per interface that has one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InterfaceEnumeration`] if the interfaces cannot be
    /// listed.
    fn hardware_addresses(&self) -> Result<Vec<HardwareAddress>>;
}

/// The live [`InterfaceSource`], backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostInterfaces;

impl InterfaceSource for HostInterfaces {
    fn hardware_addresses(&self) -> Result<Vec<HardwareAddress>> {
        let interfaces = MacAddressIterator::new()
            .map_err(|err| Error::InterfaceEnumeration(err.to_string()))?;
        Ok(interfaces.map(|mac| mac.bytes()).collect())
    }
}

/// Derives a node ID from an [`InterfaceSource`].
///
/// # Example
///
/// ```
/// use sequencer::{HardwareAddress, InterfaceSource, NodeIdResolver, Result};
///
/// struct Fixed;
/// impl InterfaceSource for Fixed {
///     fn hardware_addresses(&self) -> Result<Vec<HardwareAddress>> {
///         Ok(vec![[0x02, 0x42, 0xac, 0x11, 0x00, 0x02]])
///     }
/// }
///
/// let resolver = NodeIdResolver::with_source(Fixed);
/// let node_id = resolver.resolve().unwrap();
/// assert_eq!(node_id, resolver.resolve().unwrap());
/// assert!(node_id <= 1023);
/// ```
#[derive(Clone, Debug, Default)]
pub struct NodeIdResolver<S = HostInterfaces> {
    source: S,
}

impl<S> NodeIdResolver<S>
where
    S: InterfaceSource,
{
    /// Creates a resolver reading addresses from `source`.
    pub const fn with_source(source: S) -> Self {
        Self { source }
    }

    /// Derives the node ID.
    ///
    /// Every non-zero hardware address is rendered as lower-case,
    /// colon-separated hex and the renderings are joined with `:` in
    /// enumeration order. A non-empty fingerprint is hashed with CRC-32
    /// (IEEE). Without one, a random non-negative 63-bit value is drawn from
    /// the thread-local RNG instead. Either value is folded into
    /// `0..=SequencerId::max_node_id()` by masking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InterfaceEnumeration`] if the interfaces cannot be
    /// listed.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self), err))]
    pub fn resolve(&self) -> Result<u64> {
        let addresses = self.source.hardware_addresses()?;
        let fingerprint = hardware_fingerprint(&addresses);

        let raw = if fingerprint.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::warn!("no hardware address found, falling back to a random node id");

            // Non-negative 63-bit draw. Not a secret, so the thread-local RNG
            // is fine.
            rand::rng().random_range(0..=i64::MAX)
        } else {
            #[cfg(feature = "tracing")]
            tracing::debug!(%fingerprint, "deriving node id from hardware addresses");

            i64::from(crc32fast::hash(fingerprint.as_bytes()))
        };

        Ok(fold_node_id(raw))
    }
}

/// Checks that an explicitly supplied node ID fits the layout.
///
/// # Errors
///
/// Returns [`Error::InvalidNodeId`] unless
/// `0 <= node_id <= SequencerId::max_node_id()`.
///
/// # Example
///
/// ```
/// use sequencer::validate_node_id;
///
/// assert_eq!(validate_node_id(0).unwrap(), 0);
/// assert_eq!(validate_node_id(1023).unwrap(), 1023);
/// assert!(validate_node_id(-1).is_err());
/// assert!(validate_node_id(1024).is_err());
/// ```
pub fn validate_node_id(node_id: i64) -> Result<u64> {
    let max = SequencerId::max_node_id();
    match u64::try_from(node_id) {
        Ok(valid) if valid <= max => Ok(valid),
        _ => Err(Error::InvalidNodeId { node_id, max }),
    }
}

/// Absolute value, then mask into the node ID range.
fn fold_node_id(raw: i64) -> u64 {
    raw.unsigned_abs() & SequencerId::max_node_id()
}

/// Joins the non-zero addresses as `aa:bb:cc:dd:ee:ff:11:22:...`.
///
/// All-zero addresses (loopback, tunnels) carry no host identity and count as
/// absent.
fn hardware_fingerprint(addresses: &[HardwareAddress]) -> String {
    let mut fingerprint = String::new();
    for address in addresses.iter().filter(|address| address.iter().any(|&b| b != 0)) {
        for byte in address {
            if !fingerprint.is_empty() {
                fingerprint.push(':');
            }
            // Writing to a String cannot fail.
            let _ = write!(fingerprint, "{byte:02x}");
        }
    }
    fingerprint
}
