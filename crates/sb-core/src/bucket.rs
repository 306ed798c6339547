//! Bucket mapping
//!
//! Keys hash into a fixed set of buckets; buckets map onto replicasets.

use crc::{Crc, CRC_16_XMODEM};

/// Total number of buckets in the cluster
pub const TOTAL_BUCKETS: u32 = 3000;

/// CRC16 calculator (XMODEM variant)
static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Calculate the bucket for a key
pub fn bucket_for_key(key: &[u8]) -> u32 {
    CRC16.checksum(key) as u32 % TOTAL_BUCKETS
}
