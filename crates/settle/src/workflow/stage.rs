use std::fmt;

use super::row::WorkRow;

/// 작업 레코드의 진행 단계.
///
/// 시트에는 단계 칸이 따로 없고 채워진 필드 조합이 곧 단계다.
/// `classify` 가 그 조합을 이 열거형으로 복원한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// 등록만 된 상태. 해외 계좌 입금 대기.
    Waiting,
    /// 외화는 들어왔고 거래소 입금 대기.
    ForeignDepositPending,
    /// 거래소 작업 중.
    InProgress,
    /// 최종달러 확정, 원화 입금 대기.
    SettlementPending,
    /// 입금 확인, 수익 정산 대기.
    Settling,
    /// 정산 완료.
    Settled,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Waiting => "대기",
            Stage::ForeignDepositPending => "진행대기",
            Stage::InProgress => "진행중",
            Stage::SettlementPending => "정산대기",
            Stage::Settling => "정산중",
            Stage::Settled => "정산완료",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 채워진 필드 조합으로 단계를 판정한다. 위에서부터 우선한다.
pub fn classify(row: &WorkRow) -> Stage {
    if row.is_settled() {
        Stage::Settled
    } else if row.profit.is_some() && row.settlement.trim().is_empty() {
        Stage::Settling
    } else if row.final_amount.is_some() && row.deposit.is_none() {
        Stage::SettlementPending
    } else if row.progress.trim() == "진행" && row.final_amount.is_none() {
        Stage::InProgress
    } else if row.foreign_received.is_some() && row.progress.trim().is_empty() {
        Stage::ForeignDepositPending
    } else {
        Stage::Waiting
    }
}

/// 레코드를 다음 단계로 옮기는 명령.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCommand {
    /// 외화입금 <금액>
    ForeignDeposit,
    /// 진행
    Progress,
    /// 바낸달러 <잔액> (별칭: 바낸달라)
    ExchangeRemaining,
    /// 입금 <원화금액>
    DomesticDeposit,
    /// 정산 <수익입금액>
    Settlement,
    /// 정산완료
    SettlementComplete,
}

impl TransitionCommand {
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "외화입금" => Some(Self::ForeignDeposit),
            "진행" => Some(Self::Progress),
            "바낸달러" | "바낸달라" => Some(Self::ExchangeRemaining),
            "입금" => Some(Self::DomesticDeposit),
            "정산" => Some(Self::Settlement),
            "정산완료" => Some(Self::SettlementComplete),
            _ => None,
        }
    }

    pub fn word(&self) -> &'static str {
        match self {
            Self::ForeignDeposit => "외화입금",
            Self::Progress => "진행",
            Self::ExchangeRemaining => "바낸달러",
            Self::DomesticDeposit => "입금",
            Self::Settlement => "정산",
            Self::SettlementComplete => "정산완료",
        }
    }

    /// 이 명령이 허용되는 현재 단계.
    pub fn allowed_from(&self) -> Stage {
        match self {
            Self::ForeignDeposit => Stage::Waiting,
            Self::Progress => Stage::ForeignDepositPending,
            Self::ExchangeRemaining => Stage::InProgress,
            Self::DomesticDeposit => Stage::SettlementPending,
            Self::Settlement => Stage::Settling,
            Self::SettlementComplete => Stage::Settling,
        }
    }

    /// 금액 인자가 필요한 명령인지.
    pub fn takes_value(&self) -> bool {
        !matches!(self, Self::Progress | Self::SettlementComplete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_row() -> WorkRow {
        WorkRow {
            deposit_date: "2025. 1. 3.".into(),
            name: "홍길동".into(),
            withdrawal: Some(700_000),
            foreign_amount: Some(498),
            currency: "USD".into(),
            issue_code: "4821".into(),
            ..WorkRow::default()
        }
    }

    #[test]
    fn classify_walks_the_lifecycle() {
        let mut row = base_row();
        assert_eq!(classify(&row), Stage::Waiting);

        row.foreign_received = Some(498);
        row.foreign_net = Some(496);
        assert_eq!(classify(&row), Stage::ForeignDepositPending);

        row.progress = "진행".into();
        assert_eq!(classify(&row), Stage::InProgress);

        row.exchange_remaining = Some(497);
        row.final_amount = Some(496);
        assert_eq!(classify(&row), Stage::SettlementPending);

        row.deposit = Some(719_200);
        row.profit = Some(9_600);
        assert_eq!(classify(&row), Stage::Settling);

        row.profit_deposit = Some(9_600);
        row.settlement = "정산완료".into();
        assert_eq!(classify(&row), Stage::Settled);
    }

    #[test]
    fn settled_marker_wins_over_everything() {
        let mut row = base_row();
        row.settlement = "완료".into();
        assert_eq!(classify(&row), Stage::Settled);
    }

    #[test]
    fn transition_words_and_aliases() {
        assert_eq!(
            TransitionCommand::from_word("바낸달라"),
            Some(TransitionCommand::ExchangeRemaining)
        );
        assert_eq!(
            TransitionCommand::from_word("외화입금"),
            Some(TransitionCommand::ForeignDeposit)
        );
        assert_eq!(TransitionCommand::from_word("리빌드"), None);
    }

    #[test]
    fn each_command_has_one_source_stage() {
        assert_eq!(
            TransitionCommand::ForeignDeposit.allowed_from(),
            Stage::Waiting
        );
        assert_eq!(
            TransitionCommand::DomesticDeposit.allowed_from(),
            Stage::SettlementPending
        );
        assert_eq!(
            TransitionCommand::SettlementComplete.allowed_from(),
            Stage::Settling
        );
    }
}
