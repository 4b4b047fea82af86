//! Trade-flow file classification.

use std::fmt;

/// The four kinds of settlement file a merchant cares about, identified by
/// a marker in the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeFlowType {
    /// `ZM_` ordinary trade flow.
    Normal,
    /// `ZME_` error trade flow.
    Error,
    /// `PED_` periodic trade flow.
    Periodic,
    /// `PEDERR_` periodic error trade flow.
    PeriodicError,
}

impl TradeFlowType {
    pub const ALL: [TradeFlowType; 4] = [
        Self::Normal,
        Self::Error,
        Self::Periodic,
        Self::PeriodicError,
    ];

    pub fn marker(self) -> &'static str {
        match self {
            Self::Normal => "ZM_",
            Self::Error => "ZME_",
            Self::Periodic => "PED_",
            Self::PeriodicError => "PEDERR_",
        }
    }

    /// The flow a file name belongs to, regardless of merchant.
    pub fn of_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flow| name.contains(flow.marker()))
    }
}

impl fmt::Display for TradeFlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// `true` iff `name` carries a trade-flow marker and ends with `merchant_id`.
pub fn accept_file(name: &str, merchant_id: &str) -> bool {
    !merchant_id.is_empty()
        && name.ends_with(merchant_id)
        && TradeFlowType::of_file_name(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MER: &str = "700000000000001";

    #[test]
    fn accepts_every_flow_for_our_merchant() {
        for flow in TradeFlowType::ALL {
            let name = format!("INN26101688{}{}", flow.marker(), MER);
            assert!(accept_file(&name, MER), "{} rejected", name);
            assert_eq!(TradeFlowType::of_file_name(&name), Some(flow));
        }
    }

    #[test]
    fn rejects_other_merchants_and_unknown_flows() {
        assert!(!accept_file("INN26101688ZM_999999999999999", MER));
        assert!(!accept_file("INN26101688XX_700000000000001", MER));
        assert!(!accept_file("INN26101688ZM_700000000000001.txt", MER));
        assert!(!accept_file("INN26101688ZM_", ""));
    }

    #[test]
    fn error_markers_are_not_mistaken_for_plain_ones() {
        assert_eq!(TradeFlowType::of_file_name("ZME_1"), Some(TradeFlowType::Error));
        assert_eq!(
            TradeFlowType::of_file_name("PEDERR_1"),
            Some(TradeFlowType::PeriodicError)
        );
    }
}
