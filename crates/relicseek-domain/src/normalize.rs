//! Fact value normalization and equivalence
//!
//! Sources rarely agree on surface form: one page says "Eastern Han dynasty",
//! another "东汉", a third "2nd century AD". Comparing values by exact string
//! would open a conflict for each of these, so every comparison of fact values
//! goes through [`SynonymTable::values_equivalent`], which applies in order:
//!
//! 1. text normalization (case, full-width forms, punctuation, whitespace)
//! 2. synonym canonicalization (built-in material, object and dynasty groups)
//! 3. for date-like fields, year-span overlap within [`DATE_TOLERANCE_YEARS`]
//! 4. token containment ("bronze" vs "cast bronze")

use std::collections::{BTreeSet, HashMap};

/// Maximum gap, in years, between two date spans still considered the same date
pub const DATE_TOLERANCE_YEARS: i32 = 10;

/// Extra widening applied to spans qualified with "circa" / "约"
pub const APPROXIMATE_WIDEN_YEARS: i32 = 25;

/// Tokens that carry no meaning when comparing values
const FILLER_TOKENS: &[&str] = &["the", "of", "a", "an", "dynasty", "period", "era", "朝", "代", "时期"];

/// Field names whose values are compared as dates
const DATE_FIELDS: &[&str] = &[
    "date", "dating", "era", "period", "year", "years", "dynasty", "age", "年代", "时代", "朝代", "日期",
];

/// Built-in synonym groups; the first member of each group is its canonical form
const BUILTIN_GROUPS: &[&[&str]] = &[
    // materials
    &["bronze", "青铜", "青铜器", "bronze ware", "铜"],
    &["jade", "玉", "玉器", "nephrite"],
    &["porcelain", "瓷", "瓷器"],
    &["pottery", "earthenware", "陶", "陶器"],
    &["gold", "金", "黄金"],
    &["silver", "银", "白银"],
    &["lacquer", "漆", "漆器", "lacquerware"],
    &["silk", "丝", "丝绸"],
    &["iron", "铁"],
    // object types
    &["vase", "瓶", "花瓶"],
    &["ding", "鼎", "tripod cauldron"],
    &["mirror", "镜", "铜镜"],
    &["galloping horse treading on a flying swallow", "马踏飞燕", "铜奔马", "flying horse of gansu", "bronze running horse"],
    // dynasties
    &["shang", "商", "商代", "商朝"],
    &["western zhou", "西周"],
    &["eastern zhou", "东周"],
    &["zhou", "周", "周代", "周朝"],
    &["qin", "秦", "秦代", "秦朝"],
    &["western han", "西汉", "former han"],
    &["eastern han", "东汉", "later han"],
    &["han", "汉", "汉代", "汉朝"],
    &["sui", "隋", "隋代", "隋朝"],
    &["tang", "唐", "唐代", "唐朝"],
    &["song", "宋", "宋代", "宋朝"],
    &["yuan", "元", "元代", "元朝"],
    &["ming", "明", "明代", "明朝"],
    &["qing", "清", "清代", "清朝"],
];

/// Year spans of the canonical dynasty names (negative = BCE)
const DYNASTY_SPANS: &[(&str, i32, i32)] = &[
    ("shang", -1600, -1046),
    ("western zhou", -1046, -771),
    ("eastern zhou", -770, -256),
    ("zhou", -1046, -256),
    ("qin", -221, -206),
    ("western han", -206, 8),
    ("eastern han", 25, 220),
    ("han", -206, 220),
    ("sui", 581, 618),
    ("tang", 618, 907),
    ("song", 960, 1279),
    ("yuan", 1271, 1368),
    ("ming", 1368, 1644),
    ("qing", 1644, 1912),
];

/// Normalize free text for comparison
///
/// Folds full-width ASCII to half-width, lowercases, turns every
/// non-alphanumeric character into a space and collapses whitespace.
/// CJK ideographs count as alphanumeric and are kept.
///
/// # Examples
///
/// ```
/// use relicseek_domain::normalize::normalize_text;
///
/// assert_eq!(normalize_text("  Eastern-Han,  Dynasty "), "eastern han dynasty");
/// assert_eq!(normalize_text("ＢＲＯＮＺＥ"), "bronze");
/// ```
pub fn normalize_text(value: &str) -> String {
    let folded: String = value.chars().map(fold_full_width).collect();
    let mapped: String = folded
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold_full_width(c: char) -> char {
    match c {
        '\u{3000}' => ' ',
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        _ => c,
    }
}

/// Whether a field holds a date, era or dynasty
pub fn is_date_field(field: &str) -> bool {
    let field = normalize_text(field).replace(' ', "_");
    DATE_FIELDS.contains(&field.as_str())
        || field.contains("date")
        || field.contains("year")
        || field.contains("年代")
        || field.contains("朝代")
}

/// Synonym groups used to canonicalize fact values
#[derive(Debug, Clone)]
pub struct SynonymTable {
    groups: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

impl SynonymTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Create a table holding the built-in material, object and dynasty groups
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for group in BUILTIN_GROUPS {
            table.add_group(group.iter().copied());
        }
        table
    }

    /// Add a group of equivalent surface forms, builder style
    pub fn with_group<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_group(group);
        self
    }

    /// Add a group of equivalent surface forms
    ///
    /// The first member becomes the canonical form. A form already present in
    /// another group is left where it is.
    pub fn add_group<I, S>(&mut self, group: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let members: Vec<String> = group
            .into_iter()
            .map(|m| normalize_text(m.as_ref()))
            .filter(|m| !m.is_empty())
            .collect();
        if members.is_empty() {
            return;
        }

        let group_idx = self.groups.len();
        for member in &members {
            self.index.entry(member.clone()).or_insert(group_idx);
        }
        self.groups.push(members);
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the table has no groups
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn lookup(&self, normalized: &str) -> Option<&str> {
        self.index
            .get(normalized)
            .and_then(|&idx| self.groups.get(idx))
            .and_then(|group| group.first())
            .map(String::as_str)
    }

    /// Canonical form of a value
    ///
    /// Normalizes the text, drops filler tokens, then maps the whole value to
    /// its group representative when it belongs to a group, or each token to
    /// its representative otherwise.
    pub fn canonical_form(&self, value: &str) -> String {
        let normalized = normalize_text(value);
        if let Some(rep) = self.lookup(&normalized) {
            return rep.to_string();
        }

        let stripped = strip_fillers(&normalized);
        let base = if stripped.is_empty() { normalized } else { stripped };
        if let Some(rep) = self.lookup(&base) {
            return rep.to_string();
        }

        base.split(' ')
            .map(|token| self.lookup(token).unwrap_or(token))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Decide whether two values of the same field say the same thing
    ///
    /// # Examples
    ///
    /// ```
    /// use relicseek_domain::SynonymTable;
    ///
    /// let table = SynonymTable::builtin();
    /// assert!(table.values_equivalent("material", "Bronze", "青铜"));
    /// assert!(table.values_equivalent("date", "Eastern Han", "2nd century AD"));
    /// assert!(!table.values_equivalent("date", "Tang dynasty", "Ming dynasty"));
    /// ```
    pub fn values_equivalent(&self, field: &str, a: &str, b: &str) -> bool {
        let na = normalize_text(a);
        let nb = normalize_text(b);
        if na == nb {
            return true;
        }

        let ca = self.canonical_form(a);
        let cb = self.canonical_form(b);
        if ca == cb {
            return true;
        }

        if is_date_field(field) {
            if let (Some(sa), Some(sb)) = (self.year_span(a), self.year_span(b)) {
                return spans_match(sa, sb);
            }
        }

        tokens_contained(&ca, &cb)
    }

    /// Deterministic evidence key from an artifact name and era
    ///
    /// The era part is reduced to a dynasty name when one is recognizable, so
    /// "Eastern Han dynasty (25-220)" and "东汉" produce the same key.
    pub fn normalize_key(&self, name: &str, era: &str) -> String {
        let name_key = self.canonical_form(name);
        let era_key = self
            .find_dynasty(&self.canonical_form(era))
            .map(str::to_string)
            .unwrap_or_else(|| self.canonical_form(era));
        format!("{}|{}", name_key, era_key)
    }

    /// Year span described by a date-like value, if any
    ///
    /// Explicit years and centuries win over dynasty names.
    pub fn year_span(&self, value: &str) -> Option<(i32, i32)> {
        if let Some(span) = parse_year_span(value) {
            return Some(span);
        }
        let canonical = self.canonical_form(value);
        let dynasty = self.find_dynasty(&canonical)?;
        DYNASTY_SPANS
            .iter()
            .find(|(name, _, _)| *name == dynasty)
            .map(|&(_, lo, hi)| (lo, hi))
    }

    /// Longest dynasty name contained in a canonical value
    fn find_dynasty(&self, canonical: &str) -> Option<&'static str> {
        let tokens: Vec<&str> = canonical.split(' ').collect();
        let mut candidates: Vec<String> = Vec::new();
        for window in tokens.windows(2) {
            candidates.push(window.join(" "));
        }
        candidates.extend(tokens.iter().map(|t| self.lookup(t).unwrap_or(*t).to_string()));

        candidates.iter().find_map(|candidate| {
            DYNASTY_SPANS
                .iter()
                .find(|(name, _, _)| name == candidate)
                .map(|(name, _, _)| *name)
        })
    }
}

impl Default for SynonymTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn strip_fillers(normalized: &str) -> String {
    normalized
        .split(' ')
        .filter(|token| !token.is_empty() && !FILLER_TOKENS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokens_contained(a: &str, b: &str) -> bool {
    let ta: BTreeSet<&str> = a.split(' ').filter(|t| !t.is_empty()).collect();
    let tb: BTreeSet<&str> = b.split(' ').filter(|t| !t.is_empty()).collect();
    if ta.is_empty() || tb.is_empty() {
        return false;
    }
    ta.is_subset(&tb) || tb.is_subset(&ta)
}

fn spans_match(a: (i32, i32), b: (i32, i32)) -> bool {
    a.0 <= b.1 + DATE_TOLERANCE_YEARS && b.0 <= a.1 + DATE_TOLERANCE_YEARS
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Era {
    Bce,
    Ce,
}

/// Parse explicit years or centuries out of a date value
///
/// Understands "221 BC", "公元前221年", "AD 25", "25-220 CE", "2nd century BCE",
/// "公元2世纪" and "c. 1200 BC". Unmarked years inherit the era of the next
/// marked one ("206-220 BC"), defaulting to CE.
fn parse_year_span(value: &str) -> Option<(i32, i32)> {
    let text: String = value.chars().map(fold_full_width).collect::<String>().to_lowercase();
    let chars: Vec<char> = text.chars().collect();

    struct Number {
        value: i32,
        era: Option<Era>,
        century: bool,
    }

    let mut numbers: Vec<Number> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        let digits: String = chars[start..i].iter().collect();
        let Ok(value) = digits.parse::<i32>() else {
            continue;
        };
        if value > 9999 {
            continue;
        }

        let before: String = chars[..start].iter().collect();
        let before = before.trim_end();
        let after: String = chars[i..].iter().collect();
        let after = after.trim_start();
        let after = strip_ordinal(after);

        let century = after.starts_with("century") || after.starts_with("世纪");
        let after_unit = after
            .strip_prefix("century")
            .or_else(|| after.strip_prefix("世纪"))
            .unwrap_or(after)
            .trim_start();

        let era = if starts_with_word(after_unit, "bce")
            || starts_with_word(after_unit, "bc")
            || after_unit.starts_with("b.c")
        {
            Some(Era::Bce)
        } else if starts_with_word(after_unit, "ad")
            || starts_with_word(after_unit, "ce")
            || after_unit.starts_with("a.d")
            || after_unit.starts_with("c.e")
        {
            Some(Era::Ce)
        } else if before.ends_with("公元前") || before.ends_with("前") {
            Some(Era::Bce)
        } else if before.ends_with("公元") || before.ends_with("ad") || before.ends_with("a.d.") {
            Some(Era::Ce)
        } else {
            None
        };

        numbers.push(Number { value, era, century });
    }

    if numbers.is_empty() {
        return None;
    }

    // Unmarked numbers take the era of the next marked one.
    let mut next_era = Era::Ce;
    for number in numbers.iter_mut().rev() {
        match number.era {
            Some(era) => next_era = era,
            None => number.era = Some(next_era),
        }
    }

    let mut lo = i32::MAX;
    let mut hi = i32::MIN;
    for number in &numbers {
        let (start, end) = match (number.century, number.era.unwrap_or(Era::Ce)) {
            (true, Era::Ce) => ((number.value - 1) * 100 + 1, number.value * 100),
            (true, Era::Bce) => (-(number.value * 100), -((number.value - 1) * 100 + 1)),
            (false, Era::Ce) => (number.value, number.value),
            (false, Era::Bce) => (-number.value, -number.value),
        };
        lo = lo.min(start);
        hi = hi.max(end);
    }

    let approximate = text.contains("circa")
        || text.starts_with("c.")
        || text.contains(" c.")
        || text.contains("ca.")
        || text.contains("about")
        || text.contains("around")
        || text.contains('约');
    if approximate {
        lo -= APPROXIMATE_WIDEN_YEARS;
        hi += APPROXIMATE_WIDEN_YEARS;
    }

    Some((lo, hi))
}

fn strip_ordinal(text: &str) -> &str {
    for suffix in ["st", "nd", "rd", "th"] {
        if let Some(rest) = text.strip_prefix(suffix) {
            return rest.trim_start();
        }
    }
    text
}

fn starts_with_word(text: &str, word: &str) -> bool {
    text.strip_prefix(word)
        .map(|rest| rest.chars().next().map_or(true, |c| !c.is_ascii_alphabetic()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("Bronze"), "bronze");
        assert_eq!(normalize_text("  cast   bronze\t"), "cast bronze");
        assert_eq!(normalize_text("Gansu Provincial Museum, Lanzhou."), "gansu provincial museum lanzhou");
        assert_eq!(normalize_text("马踏飞燕（铜奔马）"), "马踏飞燕 铜奔马");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_synonyms_across_languages() {
        let table = SynonymTable::builtin();
        assert!(table.values_equivalent("material", "bronze", "青铜"));
        assert!(table.values_equivalent("material", "Bronze ware", "青铜器"));
        assert!(table.values_equivalent("dynasty", "Han Dynasty", "汉代"));
        assert!(!table.values_equivalent("material", "bronze", "jade"));
    }

    #[test]
    fn test_token_containment() {
        let table = SynonymTable::builtin();
        assert!(table.values_equivalent("material", "bronze", "cast bronze"));
        assert!(table.values_equivalent("location", "Gansu Provincial Museum", "Gansu Provincial Museum, Lanzhou"));
        assert!(!table.values_equivalent("location", "Gansu Provincial Museum", "Palace Museum"));
    }

    #[test]
    fn test_custom_group() {
        let table = SynonymTable::new().with_group(["beaker", "gu", "觚"]);
        assert!(table.values_equivalent("type", "Gu", "觚"));
        assert_eq!(table.canonical_form("觚"), "beaker");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_year_spans() {
        assert_eq!(parse_year_span("221 BC"), Some((-221, -221)));
        assert_eq!(parse_year_span("公元前221年"), Some((-221, -221)));
        assert_eq!(parse_year_span("AD 25"), Some((25, 25)));
        assert_eq!(parse_year_span("25-220 CE"), Some((25, 220)));
        assert_eq!(parse_year_span("206-220 BC"), Some((-220, -206)));
        assert_eq!(parse_year_span("206 BC - 220 AD"), Some((-206, 220)));
        assert_eq!(parse_year_span("2nd century AD"), Some((101, 200)));
        assert_eq!(parse_year_span("2nd century BCE"), Some((-200, -101)));
        assert_eq!(parse_year_span("公元2世纪"), Some((101, 200)));
        assert_eq!(parse_year_span("Eastern Han"), None);
    }

    #[test]
    fn test_dates_within_tolerance() {
        let table = SynonymTable::builtin();
        assert!(table.values_equivalent("date", "186 AD", "190 AD"));
        assert!(!table.values_equivalent("date", "186 AD", "250 AD"));
        assert!(table.values_equivalent("date", "Eastern Han", "2nd century AD"));
        assert!(table.values_equivalent("date", "东汉", "25-220"));
        assert!(!table.values_equivalent("date", "Eastern Han", "Tang"));
        assert!(!table.values_equivalent("date", "Western Han", "Eastern Han"));
    }

    #[test]
    fn test_dates_not_compared_for_other_fields() {
        let table = SynonymTable::builtin();
        // "height" is not a date field: 34 and 35 are different measurements
        assert!(!table.values_equivalent("height", "34.5 cm", "35 cm"));
    }

    #[test]
    fn test_is_date_field() {
        assert!(is_date_field("date"));
        assert!(is_date_field("Dynasty"));
        assert!(is_date_field("creation_date"));
        assert!(is_date_field("年代"));
        assert!(!is_date_field("material"));
    }

    #[test]
    fn test_normalize_key() {
        let table = SynonymTable::builtin();
        let a = table.normalize_key("Galloping Horse Treading on a Flying Swallow", "Eastern Han dynasty (25-220)");
        let b = table.normalize_key("马踏飞燕", "东汉");
        assert_eq!(a, b);
        assert_eq!(a, "galloping horse treading on a flying swallow|eastern han");

        let c = table.normalize_key("Houmuwu Ding", "");
        assert_eq!(c, "houmuwu ding|");
    }
}
