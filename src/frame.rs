//! Advertisement record walker and Eddystone-URL frame extraction.
//!
//! AD structure format: [length] [type] [data...], where `length` counts the
//! type byte plus data but not itself. The walk is bounds-checked against the
//! payload; a record that claims more bytes than remain aborts the whole
//! advertisement with [`Error::MalformedAdvertisement`].

use heapless::Vec;

use crate::error::Error;

/// AD type: Service Data - 16-bit UUID
pub const AD_TYPE_SERVICE_DATA: u8 = 0x16;

/// Eddystone 16-bit service UUID 0xFEAA, little-endian on air.
pub const EDDYSTONE_UUID: [u8; 2] = [0xAA, 0xFE];

/// Eddystone frame type byte for URL frames.
pub const FRAME_TYPE_URL: u8 = 0x10;

/// Service data header before the URL bytes: UUID (2) + frame type (1) + TX power (1).
pub const SERVICE_DATA_HEADER_LEN: usize = 2 + 1 + 1;

/// Maximum encoded URL bytes in an Eddystone-URL frame.
pub const URL_MAX_LEN: usize = 18;

/// Largest legacy advertising payload.
pub const MAX_ADV_DATA_LEN: usize = 31;

/// Owned copy of one advertisement report, handed from the radio callback to
/// the observer.
#[derive(Debug, Clone)]
pub struct RawAdvertisement {
    pub data: Vec<u8, MAX_ADV_DATA_LEN>,
    pub rssi: i8,
}

impl RawAdvertisement {
    /// Copy a report; `None` if it exceeds the legacy advertising size.
    pub fn copy_from(data: &[u8], rssi: i8) -> Option<Self> {
        let data = Vec::from_slice(data).ok()?;
        Some(Self { data, rssi })
    }
}

/// One AD structure borrowed from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdRecord<'a> {
    pub ad_type: u8,
    pub data: &'a [u8],
}

/// Iterator over the AD structures of a payload.
///
/// Yields `Err` once and then stops if a record overruns the payload. A zero
/// length byte ends the significant part (the rest is padding).
pub struct AdRecords<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> AdRecords<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload, pos: 0 }
    }
}

impl<'a> Iterator for AdRecords<'a> {
    type Item = Result<AdRecord<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.pos;
        let len = *self.payload.get(pos)? as usize;
        if len == 0 {
            self.pos = self.payload.len();
            return None;
        }

        let available = self.payload.len() - pos - 1;
        if len > available {
            self.pos = self.payload.len();
            return Some(Err(Error::MalformedAdvertisement {
                offset: pos,
                claimed: len,
                available,
            }));
        }

        self.pos = pos + 1 + len;
        Some(Ok(AdRecord {
            ad_type: self.payload[pos + 1],
            data: &self.payload[pos + 2..pos + 1 + len],
        }))
    }
}

/// Eddystone service data carrying a URL frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlFrame<'a> {
    /// Calibrated TX power at 0 m, in dBm.
    pub tx_power: i8,
    /// Encoded URL: scheme byte followed by body bytes.
    pub url: &'a [u8],
}

impl<'a> UrlFrame<'a> {
    /// Interpret service data as an Eddystone-URL frame.
    ///
    /// `Ok(None)` when the data belongs to another service or frame type.
    pub fn parse(service_data: &'a [u8]) -> Result<Option<Self>, Error> {
        if service_data.len() < SERVICE_DATA_HEADER_LEN {
            return Ok(None);
        }
        if service_data[..2] != EDDYSTONE_UUID || service_data[2] != FRAME_TYPE_URL {
            return Ok(None);
        }

        let url = &service_data[SERVICE_DATA_HEADER_LEN..];
        if url.len() > URL_MAX_LEN {
            return Err(Error::MalformedAdvertisement {
                offset: SERVICE_DATA_HEADER_LEN,
                claimed: url.len(),
                available: URL_MAX_LEN,
            });
        }

        Ok(Some(Self {
            tx_power: service_data[3] as i8,
            url,
        }))
    }
}

/// Find the first Eddystone-URL frame in an advertisement payload.
///
/// Scanning stops at the first match; records after it are not inspected.
pub fn extract_url_frame(payload: &[u8]) -> Result<Option<UrlFrame<'_>>, Error> {
    for record in AdRecords::new(payload) {
        let record = record?;
        if record.ad_type != AD_TYPE_SERVICE_DATA {
            continue;
        }
        if let Some(frame) = UrlFrame::parse(record.data)? {
            return Ok(Some(frame));
        }
    }
    Ok(None)
}
