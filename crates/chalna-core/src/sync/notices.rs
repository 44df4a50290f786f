//! Transient on-screen notices.
//!
//! A notice is visible until its expiry instant. Showing a notice that is
//! already visible replaces it rather than stacking a second one.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::i18n::{translate_with, Translator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The countdown caught up after `minutes` in the background.
    Sync { minutes: i64 },
    TimezoneChanged,
}

impl Notice {
    pub fn render(&self, translator: &dyn Translator) -> String {
        match self {
            Self::Sync { minutes } => translate_with(
                translator,
                "backgroundSyncMessage",
                &[("minutes", minutes.to_string())],
            ),
            Self::TimezoneChanged => translator.translate("timezoneChanged"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Shown {
    notice: Notice,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NoticeBoard {
    sync_ttl: Duration,
    timezone_ttl: Duration,
    sync: Option<Shown>,
    timezone: Option<Shown>,
}

impl NoticeBoard {
    pub fn new(sync_ttl: Duration, timezone_ttl: Duration) -> Self {
        Self {
            sync_ttl,
            timezone_ttl,
            sync: None,
            timezone: None,
        }
    }

    pub fn show_sync(&mut self, minutes: i64, now: DateTime<Utc>) {
        self.sync = Some(Shown {
            notice: Notice::Sync { minutes },
            expires_at: expiry(now, self.sync_ttl),
        });
    }

    pub fn show_timezone_changed(&mut self, now: DateTime<Utc>) {
        self.timezone = Some(Shown {
            notice: Notice::TimezoneChanged,
            expires_at: expiry(now, self.timezone_ttl),
        });
    }

    /// Notices still visible at `now`, timezone first.
    pub fn visible(&self, now: DateTime<Utc>) -> Vec<Notice> {
        [self.timezone, self.sync]
            .into_iter()
            .flatten()
            .filter(|shown| shown.expires_at > now)
            .map(|shown| shown.notice)
            .collect()
    }

    pub fn sync_notice(&self, now: DateTime<Utc>) -> Option<Notice> {
        self.sync.filter(|s| s.expires_at > now).map(|s| s.notice)
    }

    pub fn timezone_notice(&self, now: DateTime<Utc>) -> Option<Notice> {
        self.timezone.filter(|s| s.expires_at > now).map(|s| s.notice)
    }

    /// Drop expired notices.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        self.sync = self.sync.filter(|s| s.expires_at > now);
        self.timezone = self.timezone.filter(|s| s.expires_at > now);
    }

    pub fn clear(&mut self) {
        self.sync = None;
        self.timezone = None;
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Catalog;
    use chrono::TimeZone;

    fn board() -> NoticeBoard {
        NoticeBoard::new(Duration::seconds(3), Duration::seconds(5))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn notices_expire_on_their_own_schedule() {
        let mut board = board();
        board.show_sync(2, t0());
        board.show_timezone_changed(t0());
        assert_eq!(board.visible(t0()), vec![Notice::TimezoneChanged, Notice::Sync { minutes: 2 }]);

        let later = t0() + Duration::seconds(3);
        assert_eq!(board.visible(later), vec![Notice::TimezoneChanged]);
        board.prune(t0() + Duration::seconds(5));
        assert!(board.visible(t0()).is_empty());
    }

    #[test]
    fn showing_again_replaces() {
        let mut board = board();
        board.show_sync(2, t0());
        board.show_sync(4, t0() + Duration::seconds(2));
        assert_eq!(board.visible(t0() + Duration::seconds(4)), vec![Notice::Sync { minutes: 4 }]);
    }

    #[test]
    fn huge_ttl_saturates() {
        let mut board = NoticeBoard::new(Duration::MAX, Duration::seconds(i64::MAX / 1_000));
        board.show_sync(1, t0());
        board.show_timezone_changed(t0());
        let far = t0() + Duration::days(365 * 1_000);
        assert_eq!(board.visible(far), vec![Notice::TimezoneChanged, Notice::Sync { minutes: 1 }]);
    }

    #[test]
    fn render_uses_translator() {
        let en = Catalog::default();
        assert_eq!(Notice::Sync { minutes: 1 }.render(&en), "Synced after 1 min in background");
        assert_eq!(
            Notice::TimezoneChanged.render(&en),
            "Timezone changed. Time recalculated."
        );
    }
}
