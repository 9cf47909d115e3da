//! Known swap program IDs, used to tag a transaction with a protocol when the
//! provider does not supply one.

pub const JUPITER_V6_PROGRAM_ID: &str = "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4";
pub const JUPITER_V4_PROGRAM_ID: &str = "JUP4Fb2cqiRUcaTHdrPC8h2gNsA2ETXiPDD33WcGuJB";
pub const RAYDIUM_AMM_V4_PROGRAM_ID: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";
pub const RAYDIUM_CPMM_PROGRAM_ID: &str = "CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C";
pub const RAYDIUM_CLMM_PROGRAM_ID: &str = "CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK";
pub const ORCA_WHIRLPOOL_PROGRAM_ID: &str = "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc";
pub const METEORA_DLMM_PROGRAM_ID: &str = "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo";
pub const METEORA_DAMM_V2_PROGRAM_ID: &str = "cpamdpZCGKUy5JxQXB4dcpGPiikHawvSWAd6mEn1sGG";
pub const PUMPFUN_PROGRAM_ID: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";
pub const PUMPSWAP_PROGRAM_ID: &str = "pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA";

/// Map a program ID to a protocol tag.
pub fn protocol_for_program(program_id: &str) -> Option<&'static str> {
    match program_id {
        JUPITER_V6_PROGRAM_ID | JUPITER_V4_PROGRAM_ID => Some("jupiter"),
        RAYDIUM_AMM_V4_PROGRAM_ID | RAYDIUM_CPMM_PROGRAM_ID | RAYDIUM_CLMM_PROGRAM_ID => {
            Some("raydium")
        }
        ORCA_WHIRLPOOL_PROGRAM_ID => Some("orca"),
        METEORA_DLMM_PROGRAM_ID | METEORA_DAMM_V2_PROGRAM_ID => Some("meteora"),
        PUMPFUN_PROGRAM_ID => Some("pumpfun"),
        PUMPSWAP_PROGRAM_ID => Some("pumpswap"),
        _ => None,
    }
}

/// First recognised protocol among the given program IDs. Aggregators win
/// over the pools they route through.
pub fn detect_protocol<'a>(program_ids: impl IntoIterator<Item = &'a str>) -> Option<&'static str> {
    let mut found = None;
    for program_id in program_ids {
        match protocol_for_program(program_id) {
            Some("jupiter") => return Some("jupiter"),
            Some(tag) if found.is_none() => found = Some(tag),
            _ => {}
        }
    }
    found
}
