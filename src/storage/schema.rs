//! Declarative table schema
//!
//! The whole table set is plain data: one [`TableSpec`] per record
//! collection, listed in open order, each naming its sequence, its value
//! index and its secondary indexes. [`Database`](super::Database) walks this
//! list to register, open and attach everything.

use super::kv::{Comparator, Extractor};
use crate::record::{
    base, compare, ActiveDownloadRecord, AgentRecord, AsnRecord, CityRecord, CountryRecord, DailyHostRecord,
    DailyRecord, DownloadRecord, ErrorRecord, FieldFn, HostRecord, HourlyRecord, Record, ReferrerRecord,
    SearchRecord, StatusCodeRecord, SystemRecord, TotalsRecord, UrlRecord, UserRecord, ValueRecord,
    VisitRecord,
};
use crate::error::Result;
use std::sync::Arc;

/// Which record kinds an index accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    All,
    /// Per-entity rankings never show group rows
    RegularOnly,
    GroupsOnly,
}

impl KindFilter {
    pub fn accepts(self, data: &[u8]) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::RegularOnly => !base::is_group(data),
            KindFilter::GroupsOnly => base::is_group(data),
        }
    }
}

/// Build an extractor that indexes one packed field
pub fn field_extractor(field: FieldFn, filter: KindFilter) -> Extractor {
    Arc::new(move |_key: &[u8], data: &[u8]| -> Result<Option<Vec<u8>>> {
        if !filter.accepts(data) {
            return Ok(None);
        }
        Ok(Some(field(data)?.to_vec()))
    })
}

#[derive(Clone)]
pub struct IndexSpec {
    pub name: String,
    pub compare: Comparator,
    pub dup_compare: Comparator,
    pub field: FieldFn,
    pub filter: KindFilter,
}

impl IndexSpec {
    fn counter(name: impl Into<String>, field: FieldFn, filter: KindFilter) -> Self {
        Self {
            name: name.into(),
            compare: compare::u64_le,
            dup_compare: compare::u64_le,
            field,
            filter,
        }
    }

    pub fn extractor(&self) -> Extractor {
        field_extractor(self.field, self.filter)
    }
}

#[derive(Clone)]
pub struct TableSpec {
    pub name: &'static str,
    pub compare: Comparator,
    /// Ids come from the table's own sequence
    pub sequence: bool,
    /// Accessor of the stored value hash, for text-keyed tables
    pub value_hash: Option<FieldFn>,
    pub indexes: Vec<IndexSpec>,
}

impl TableSpec {
    /// Table of one record type, keyed by its record key
    pub fn keyed<R: Record>() -> Self {
        Self {
            name: R::TABLE,
            compare: compare::u64_le,
            sequence: false,
            value_hash: None,
            indexes: Vec::new(),
        }
    }

    /// Text-keyed table with a sequence and a value index
    pub fn text_keyed<R: ValueRecord>() -> Self {
        Self {
            sequence: true,
            value_hash: Some(R::value_hash_field),
            ..Self::keyed::<R>()
        }
    }

    /// Add a counter index named `<table>.<suffix>`
    pub fn index(mut self, suffix: &str, field: FieldFn, filter: KindFilter) -> Self {
        let name = format!("{}.{}", self.name, suffix);
        self.indexes.push(IndexSpec::counter(name, field, filter));
        self
    }

    pub fn values_name(&self) -> String {
        format!("{}.values", self.name)
    }
}

/// Ordered list of every table
#[derive(Clone, Default)]
pub struct Schema {
    tables: Vec<TableSpec>,
}

impl Schema {
    pub fn new(tables: Vec<TableSpec>) -> Self {
        Self { tables }
    }

    /// Every table a web log dataset uses
    pub fn standard() -> Self {
        use KindFilter::{GroupsOnly, RegularOnly};

        Self::new(vec![
            TableSpec::keyed::<SystemRecord>(),
            TableSpec::text_keyed::<UrlRecord>()
                .index("hits", UrlRecord::field_hits, RegularOnly)
                .index("xfer", UrlRecord::field_xfer, RegularOnly)
                .index("entry", UrlRecord::field_entry, RegularOnly)
                .index("exit", UrlRecord::field_exit, RegularOnly)
                .index("groups.hits", UrlRecord::field_hits, GroupsOnly)
                .index("groups.xfer", UrlRecord::field_xfer, GroupsOnly),
            TableSpec::text_keyed::<HostRecord>()
                .index("hits", HostRecord::field_hits, RegularOnly)
                .index("xfer", HostRecord::field_xfer, RegularOnly)
                .index("groups.hits", HostRecord::field_hits, GroupsOnly)
                .index("groups.xfer", HostRecord::field_xfer, GroupsOnly),
            TableSpec::keyed::<VisitRecord>(),
            TableSpec::text_keyed::<DownloadRecord>().index("xfer", DownloadRecord::field_xfer, RegularOnly),
            TableSpec::keyed::<ActiveDownloadRecord>(),
            TableSpec::text_keyed::<AgentRecord>()
                .index("hits", AgentRecord::field_hits, RegularOnly)
                .index("visits", AgentRecord::field_visits, RegularOnly)
                .index("groups.visits", AgentRecord::field_visits, GroupsOnly),
            TableSpec::text_keyed::<ReferrerRecord>()
                .index("hits", ReferrerRecord::field_hits, RegularOnly)
                .index("groups.hits", ReferrerRecord::field_hits, GroupsOnly),
            TableSpec::text_keyed::<SearchRecord>().index("hits", SearchRecord::field_hits, RegularOnly),
            TableSpec::text_keyed::<UserRecord>()
                .index("hits", UserRecord::field_hits, RegularOnly)
                .index("groups.hits", UserRecord::field_hits, GroupsOnly),
            TableSpec::text_keyed::<ErrorRecord>().index("hits", ErrorRecord::field_hits, RegularOnly),
            TableSpec::text_keyed::<DailyHostRecord>(),
            TableSpec::keyed::<StatusCodeRecord>(),
            TableSpec::keyed::<DailyRecord>(),
            TableSpec::keyed::<HourlyRecord>(),
            TableSpec::keyed::<TotalsRecord>(),
            TableSpec::keyed::<CountryRecord>(),
            TableSpec::keyed::<CityRecord>(),
            TableSpec::keyed::<AsnRecord>(),
        ])
    }

    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|spec| spec.name == name)
    }

    pub fn with_table(mut self, spec: TableSpec) -> Self {
        self.tables.push(spec);
        self
    }
}
