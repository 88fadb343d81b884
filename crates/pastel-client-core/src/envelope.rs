use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

/// Every protocol message in spec §3 implements this trait. It names the
/// one hash field and one signature field the canonicalizer must exclude
/// (spec §4.1's "last hash field" / "last signature field" discovered by
/// suffix), and exposes the timestamp/height stamps the five invariants
/// of spec §3 check.
///
/// `EXCLUDED_FIELDS` defaults to `[HASH_FIELD, SIGNATURE_FIELD]`. The one
/// message kind with a genuinely "framework-internal" extra field —
/// [`crate::messages::CreditPackPurchaseResponse`], whose quorum signature
/// dict embeds signatures computed *over* the envelope hash — overrides it
/// to also exclude that field, matching spec §4.1's carve-out for
/// "framework-internal fields". See DESIGN.md for the reasoning.
pub trait Envelope: Serialize + DeserializeOwned {
    const HASH_FIELD: &'static str;
    const SIGNATURE_FIELD: &'static str;

    fn timestamp(&self) -> DateTime<Utc>;
    fn block_height(&self) -> u64;
    fn version(&self) -> &str;
    fn hash_value(&self) -> &str;
    fn signature_value(&self) -> &str;

    fn excluded_fields() -> &'static [&'static str] {
        &[Self::HASH_FIELD, Self::SIGNATURE_FIELD]
    }
}
