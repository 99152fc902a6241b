//! Text commands.

use gateway::QuickAction;

/// A command keyword the user can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    List,
    CancelList,
    Snooze,
    Cancel,
    Resend,
}

impl Command {
    const ALL: [Command; 6] = [
        Command::Help,
        Command::List,
        Command::CancelList,
        Command::Snooze,
        Command::Cancel,
        Command::Resend,
    ];

    /// Match a message against the command keywords.
    ///
    /// Surrounding whitespace is ignored; English keywords are matched
    /// case-insensitively.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL.into_iter().find(|command| {
            command
                .keywords()
                .iter()
                .any(|keyword| keyword.eq_ignore_ascii_case(text))
        })
    }

    /// Primary keyword, also used as quick action text.
    pub fn keyword(self) -> &'static str {
        self.keywords()[0]
    }

    /// Every accepted spelling.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Help => &["help", "使い方"],
            Self::List => &["list", "一覧"],
            Self::CancelList => &["cancel-list", "取り消し"],
            Self::Snooze => &["snooze", "スヌーズ"],
            Self::Cancel => &["cancel", "キャンセル"],
            Self::Resend => &["resend", "再送"],
        }
    }

    /// Quick action that sends this command.
    pub fn quick_action(self) -> QuickAction {
        QuickAction::echo(self.keyword())
    }
}
