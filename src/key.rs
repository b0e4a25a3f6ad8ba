use jiff::Timestamp;

/// Fixed width, most significant unit first, so byte order is time order.
pub const TICK_KEY_FORMAT: &str = "%y/%m/%d %H:%M:%S";
pub const TICK_KEY_LEN: usize = 17;

const SEPARATORS: [(usize, u8); 5] = [(2, b'/'), (5, b'/'), (8, b' '), (11, b':'), (14, b':')];

/// Second-resolution UTC timestamp identifying one tick in both logs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TickKey(String);
impl TickKey {
    pub fn now() -> Self {
        Self::from_timestamp(Timestamp::now())
    }
    pub fn from_timestamp(timestamp: Timestamp) -> Self {
        Self(timestamp.strftime(TICK_KEY_FORMAT).to_string())
    }

    pub fn parse(bytes: impl AsRef<[u8]>) -> Option<Self> {
        let bytes = bytes.as_ref();
        if bytes.len() != TICK_KEY_LEN {
            return None;
        }
        let well_formed = bytes.iter().enumerate().all(|(i, b)| {
            match SEPARATORS.iter().find(|(pos, _)| *pos == i) {
                Some((_, sep)) => b == sep,
                None => b.is_ascii_digit(),
            }
        });
        if !well_formed {
            return None;
        }
        let text = std::str::from_utf8(bytes).ok()?;
        Some(Self(text.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}
impl core::fmt::Display for TickKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
