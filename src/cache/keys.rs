//! Cache identities of the record types

use super::CacheRecord;
use crate::record::{
    AgentRecord, DownloadRecord, ErrorRecord, HostRecord, ReferrerRecord, SearchRecord, UrlRecord, UserRecord,
    VisitRecord,
};

macro_rules! text_keyed {
    ($($record:ty => $field:ident),* $(,)?) => {
        $(
            impl CacheRecord for $record {
                type Key = String;

                fn cache_key(&self) -> String {
                    self.$field.clone()
                }
            }
        )*
    };
}

text_keyed! {
    AgentRecord => agent,
    HostRecord => address,
    ReferrerRecord => referrer,
    SearchRecord => terms,
    UrlRecord => url,
    UserRecord => user,
}

/// Same URL may fail with several methods and status codes
impl CacheRecord for ErrorRecord {
    type Key = (String, String, u16);

    fn cache_key(&self) -> Self::Key {
        (self.url.clone(), self.method.clone(), self.status)
    }
}

/// Downloads are per host
impl CacheRecord for DownloadRecord {
    type Key = (String, u64);

    fn cache_key(&self) -> Self::Key {
        (self.name.clone(), self.host_key())
    }
}

impl CacheRecord for VisitRecord {
    type Key = u64;

    fn cache_key(&self) -> u64 {
        self.host_key
    }
}
