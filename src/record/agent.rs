//! User agent record

use super::{base, Record, RecordKind, ValueRecord};
use crate::codec::{self, Reader, Writer};
use crate::error::Result;

/// One user agent string (or agent group)
///
/// ```text
/// v1: [base][hits u64][visits u64][hash u64]
/// v2: + [robot u8]
/// v3: + [xfer u64]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentRecord {
    pub key: u64,
    pub kind: RecordKind,
    pub agent: String,
    pub hits: u64,
    pub visits: u64,
    pub robot: bool,
    pub xfer: u64,
}

impl AgentRecord {
    pub fn new(agent: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            agent: agent.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn field_hits(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, base::fields_offset(data)?)
    }

    pub fn field_visits(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, base::fields_offset(data)? + 8)
    }
}

impl Record for AgentRecord {
    const NAME: &'static str = "AgentRecord";
    const VERSION: u16 = 3;
    const TABLE: &'static str = "agents";

    fn key(&self) -> u64 {
        self.key
    }

    fn set_key(&mut self, key: u64) {
        self.key = key;
    }

    fn kind(&self) -> RecordKind {
        self.kind
    }

    fn data_size(&self) -> usize {
        base::size(&self.agent) + 8 * 3 + 1 + 8
    }

    fn pack_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        base::pack(w, self.kind, &self.agent)?;
        w.put(&self.hits)?;
        w.put(&self.visits)?;
        w.put(&self.hash_value())?;
        w.put(&self.robot)?;
        w.put(&self.xfer)
    }

    fn unpack_fields(&mut self, r: &mut Reader<'_>, version: u16) -> Result<()> {
        (self.kind, self.agent) = base::unpack(r)?;
        self.hits = r.get()?;
        self.visits = r.get()?;
        r.skip::<u64>()?; // value hash

        self.robot = if version >= 2 { r.get()? } else { false };
        self.xfer = if version >= 3 { r.get()? } else { 0 };
        Ok(())
    }
}

impl ValueRecord for AgentRecord {
    fn value(&self) -> &str {
        &self.agent
    }

    fn value_hash_field(data: &[u8]) -> Result<&[u8]> {
        codec::field_slice::<u64>(data, base::fields_offset(data)? + 16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::hash_str;
    use crate::record::testing::{decode, reload, Golden};

    #[test]
    fn test_current_version_round_trip() -> Result<()> {
        let mut agent = AgentRecord::new("Mozilla/5.0", RecordKind::Regular);
        agent.key = 12;
        agent.hits = 40;
        agent.visits = 3;
        agent.robot = true;
        agent.xfer = 123_456;

        assert_eq!(reload(&agent)?, agent);
        Ok(())
    }

    #[test]
    fn test_v1_golden() -> Result<()> {
        let data = Golden::default()
            .u16(1)
            .u8(0)
            .text("curl/7.1")
            .u64(5)
            .u64(2)
            .u64(hash_str(0, "curl/7.1"))
            .0;
        let agent: AgentRecord = decode(&data)?;
        assert_eq!(agent.agent, "curl/7.1");
        assert_eq!((agent.hits, agent.visits), (5, 2));
        assert!(!agent.robot);
        assert_eq!(agent.xfer, 0);
        Ok(())
    }

    #[test]
    fn test_v2_golden() -> Result<()> {
        let data = Golden::default()
            .u16(2)
            .u8(2)
            .text("Bots")
            .u64(9)
            .u64(1)
            .u64(hash_str(0, "Bots"))
            .u8(1)
            .0;
        let agent: AgentRecord = decode(&data)?;
        assert_eq!(agent.kind, RecordKind::Group);
        assert!(agent.robot);
        assert_eq!(agent.xfer, 0);
        Ok(())
    }

    #[test]
    fn test_field_accessors() -> Result<()> {
        let mut agent = AgentRecord::new("Opera", RecordKind::Regular);
        agent.hits = 77;
        agent.visits = 8;
        let data = agent.to_data()?;

        assert_eq!(AgentRecord::field_hits(&data)?, &77u64.to_le_bytes());
        assert_eq!(AgentRecord::field_visits(&data)?, &8u64.to_le_bytes());
        assert_eq!(
            AgentRecord::value_hash_field(&data)?,
            &hash_str(0, "Opera").to_le_bytes()
        );
        Ok(())
    }

    #[test]
    fn test_group_never_matches_regular() -> Result<()> {
        let group = AgentRecord::new("Opera", RecordKind::Group);
        let regular = AgentRecord::new("Opera", RecordKind::Regular);
        assert_ne!(regular.compare_value(&group.to_data()?)?, std::cmp::Ordering::Equal);
        assert_eq!(regular.compare_value(&regular.to_data()?)?, std::cmp::Ordering::Equal);
        Ok(())
    }
}
