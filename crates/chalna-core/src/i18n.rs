//! User-facing strings for notices and notifications.
//!
//! Hosts with their own translation layer implement [`Translator`]; the
//! built-in [`Catalog`] covers the handful of strings the core itself emits.

use crate::storage::normalize_language;

pub trait Translator {
    /// Look up `key`. Unknown keys come back unchanged.
    fn translate(&self, key: &str) -> String;
}

impl<F> Translator for F
where
    F: Fn(&str) -> String,
{
    fn translate(&self, key: &str) -> String {
        self(key)
    }
}

/// Built-in strings for the supported languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Catalog {
    language: &'static str,
}

type Entries = &'static [(&'static str, &'static str)];

const EN: Entries = &[
    ("title", "Time Left"),
    ("years", "years"),
    ("months", "months"),
    ("days", "days"),
    ("backgroundSyncMessage", "Synced after {minutes} min in background"),
    ("timezoneChanged", "Timezone changed. Time recalculated."),
    ("timeExpired", "Your time is up"),
    ("acknowledge", "OK"),
];

const KO: Entries = &[
    ("title", "남은 시간"),
    ("years", "년"),
    ("months", "개월"),
    ("days", "일"),
    ("backgroundSyncMessage", "백그라운드 {minutes}분 후 동기화됨"),
    ("timezoneChanged", "시간대가 변경되어 다시 계산했습니다."),
    ("timeExpired", "시간이 다 되었습니다"),
    ("acknowledge", "확인"),
];

const JA: Entries = &[
    ("title", "残り時間"),
    ("years", "年"),
    ("months", "ヶ月"),
    ("days", "日"),
    ("backgroundSyncMessage", "バックグラウンド{minutes}分後に同期しました"),
    ("timezoneChanged", "タイムゾーンが変更され、再計算しました。"),
    ("timeExpired", "時間切れです"),
    ("acknowledge", "OK"),
];

const ZH: Entries = &[
    ("title", "剩余时间"),
    ("years", "年"),
    ("months", "个月"),
    ("days", "天"),
    ("backgroundSyncMessage", "后台 {minutes} 分钟后已同步"),
    ("timezoneChanged", "时区已更改，已重新计算。"),
    ("timeExpired", "时间到了"),
    ("acknowledge", "确定"),
];

impl Catalog {
    /// Catalog for `code`, falling back to English.
    pub fn for_language(code: &str) -> Self {
        let language = match normalize_language(code).as_str() {
            "ko" => "ko",
            "ja" => "ja",
            "zh" => "zh",
            _ => "en",
        };
        Self { language }
    }

    pub fn language(&self) -> &'static str {
        self.language
    }

    fn entries(&self) -> Entries {
        match self.language {
            "ko" => KO,
            "ja" => JA,
            "zh" => ZH,
            _ => EN,
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self { language: "en" }
    }
}

impl Translator for Catalog {
    fn translate(&self, key: &str) -> String {
        self.entries()
            .iter()
            .chain(EN.iter())
            .find(|(k, _)| *k == key)
            .map(|(_, v)| (*v).to_string())
            .unwrap_or_else(|| key.to_string())
    }
}

/// Translate `key` and substitute `{name}` placeholders.
pub fn translate_with(translator: &dyn Translator, key: &str, args: &[(&str, String)]) -> String {
    let mut text = translator.translate(key);
    for (name, value) in args {
        text = text.replace(&format!("{{{name}}}"), value);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_falls_back_to_english() {
        assert_eq!(Catalog::for_language("fr").language(), "en");
        assert_eq!(Catalog::for_language("ko-KR").translate("days"), "일");
        assert_eq!(Catalog::default().translate("nope"), "nope");
    }

    #[test]
    fn placeholders_are_substituted() {
        let text = translate_with(
            &Catalog::default(),
            "backgroundSyncMessage",
            &[("minutes", "5".to_string())],
        );
        assert_eq!(text, "Synced after 5 min in background");
    }

    #[test]
    fn closures_translate() {
        let upper = |key: &str| key.to_uppercase();
        assert_eq!(upper.translate("days"), "DAYS");
    }
}
