const FLAG_CLEAR_SETTINGS: u8 = 0x01;
const FLAG_SETTING_PERSIST_VALUE: u8 = 0x01;
const FLAG_SETTING_PERSISTED: u8 = 0x02;

/// The settings ids this implementation understands; unknown ids received
/// from the peer are ignored rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingId {
    UploadBandwidth,
    DownloadBandwidth,
    RoundTripTime,
    MaxConcurrentStreams,
    CurrentCwnd,
    DownloadRetransRate,
    InitialWindowSize,
    Unknown(u32),
}

impl SettingId {
    pub fn from_wire(id: u32) -> SettingId {
        use SettingId::*;
        match id {
            1 => UploadBandwidth,
            2 => DownloadBandwidth,
            3 => RoundTripTime,
            4 => MaxConcurrentStreams,
            5 => CurrentCwnd,
            6 => DownloadRetransRate,
            7 => InitialWindowSize,
            other => Unknown(other),
        }
    }

    pub fn into_wire(self) -> u32 {
        use SettingId::*;
        match self {
            UploadBandwidth => 1,
            DownloadBandwidth => 2,
            RoundTripTime => 3,
            MaxConcurrentStreams => 4,
            CurrentCwnd => 5,
            DownloadRetransRate => 6,
            InitialWindowSize => 7,
            Unknown(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Setting {
    pub id: SettingId,
    pub persist_value: bool,
    pub persisted: bool,
    pub value: u32,
}

/// Communicates connection parameters; each entry is independent and is
/// applied (or ignored, if unrecognized) in order.
#[derive(Debug)]
pub struct Settings {
    ack: bool,
    entries: Vec<Setting>,
}

impl Settings {
    pub fn new(entries: Vec<Setting>) -> Settings {
        Settings {
            ack: false,
            entries,
        }
    }

    pub fn ack() -> Settings {
        Settings {
            ack: true,
            entries: Vec::new(),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.ack
    }

    pub fn entries(&self) -> &[Setting] {
        &self.entries
    }

    pub fn flags(&self) -> u8 {
        if self.ack {
            FLAG_CLEAR_SETTINGS
        } else {
            0
        }
    }

    pub fn load(flags: u8, payload: &[u8]) -> Result<Settings, super::Error> {
        if flags & FLAG_CLEAR_SETTINGS != 0 && !payload.is_empty() {
            // An ack/clear carrying a body is malformed.
            return Err(super::Error::InvalidPayloadLength);
        }
        if flags & FLAG_CLEAR_SETTINGS != 0 {
            return Ok(Settings::ack());
        }

        if payload.len() < 4 || (payload.len() - 4) % 8 != 0 {
            return Err(super::Error::InvalidPayloadLength);
        }

        let count = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
        let mut entries = Vec::with_capacity(count);
        let mut offset = 4;
        for _ in 0..count {
            if offset + 8 > payload.len() {
                return Err(super::Error::InvalidPayloadLength);
            }
            let flag_byte = payload[offset];
            let id = u32::from_be_bytes([0, payload[offset + 1], payload[offset + 2], payload[offset + 3]]);
            let value = u32::from_be_bytes([
                payload[offset + 4],
                payload[offset + 5],
                payload[offset + 6],
                payload[offset + 7],
            ]);
            entries.push(Setting {
                id: SettingId::from_wire(id),
                persist_value: flag_byte & FLAG_SETTING_PERSIST_VALUE != 0,
                persisted: flag_byte & FLAG_SETTING_PERSISTED != 0,
                value,
            });
            offset += 8;
        }

        Ok(Settings::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_entry() {
        let s = Settings::new(vec![Setting {
            id: SettingId::InitialWindowSize,
            persist_value: false,
            persisted: false,
            value: 65_535,
        }]);
        assert!(!s.is_ack());
        assert_eq!(s.entries().len(), 1);
    }

    #[test]
    fn rejects_truncated_payload() {
        assert!(Settings::load(0, &[0, 0, 0, 1]).is_err());
    }
}
