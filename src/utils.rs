//! Identifier generation

use bech32::Bech32m;
use uuid7::uuid7;

pub const INVOICE_HRP: &str = "inv_";
pub const PART_HRP: &str = "part_";

/// A time-ordered uuid7 encoded as bech32m under the given prefix.
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

pub fn new_invoice_id() -> anyhow::Result<String> {
    new_uuid_to_bech32(INVOICE_HRP)
}

pub fn new_part_id() -> anyhow::Result<String> {
    new_uuid_to_bech32(PART_HRP)
}
