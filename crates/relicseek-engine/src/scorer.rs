//! Credibility scoring
//!
//! A record's credibility is the best base score among its sources, raised
//! for each additional independent site that corroborates it and lowered
//! for each open conflict on its fields. Scoring is pure: the same set always scores the
//! same way.

use relicseek_domain::{Evidence, EvidenceSet};
use std::collections::BTreeSet;
use url::Url;

/// Source classes, most authoritative first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DomainClass {
    /// Museums, heritage administrations, government collections
    Museum,
    /// Universities, academies, journals
    Academic,
    /// Encyclopedias
    Encyclopedia,
    /// Culture and heritage media
    CulturalMedia,
    /// Any other web page
    GeneralWeb,
    /// Not a parseable http(s) URL
    Unclassified,
}

const MUSEUM_MARKERS: &[&str] = &[
    "museum",
    "dpm.org.cn",
    "chnmuseum",
    "palacemuseum",
    "ncha.gov.cn",
    "sach.gov.cn",
    "gsm.org.cn",
    "bowuguan",
];

const ACADEMIC_MARKERS: &[&str] = &[
    "cass.cn",
    "cnki",
    "jstor",
    "academia",
    "scholar",
    "researchgate",
    "university",
    "kaogu",
];

const ENCYCLOPEDIA_MARKERS: &[&str] = &["wikipedia.org", "baike.baidu.com", "baike.com", "britannica.com"];

const CULTURAL_MEDIA_MARKERS: &[&str] = &["heritage", "wenwu", "culture", "cctv.com", "people.com.cn", "xinhuanet"];

impl DomainClass {
    /// Classify a source URL
    pub fn classify(raw_url: &str) -> Self {
        let Ok(url) = Url::parse(raw_url) else {
            return DomainClass::Unclassified;
        };
        if url.scheme() != "http" && url.scheme() != "https" {
            return DomainClass::Unclassified;
        }
        let Some(host) = url.host_str().map(str::to_lowercase) else {
            return DomainClass::Unclassified;
        };

        let has = |markers: &[&str]| markers.iter().any(|m| host.contains(m));

        if has(MUSEUM_MARKERS) || host.ends_with(".gov.cn") || host.ends_with(".gov") {
            DomainClass::Museum
        } else if has(ACADEMIC_MARKERS)
            || host.ends_with(".edu")
            || host.contains(".edu.")
            || host.contains(".ac.")
        {
            DomainClass::Academic
        } else if has(ENCYCLOPEDIA_MARKERS) {
            DomainClass::Encyclopedia
        } else if has(CULTURAL_MEDIA_MARKERS) {
            DomainClass::CulturalMedia
        } else {
            DomainClass::GeneralWeb
        }
    }

    /// Base credibility of a single source of this class
    pub fn base_score(&self) -> f64 {
        match self {
            DomainClass::Museum => 0.90,
            DomainClass::Academic => 0.80,
            DomainClass::Encyclopedia => 0.60,
            DomainClass::CulturalMedia => 0.50,
            DomainClass::GeneralWeb => 0.35,
            DomainClass::Unclassified => 0.20,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainClass::Museum => "museum",
            DomainClass::Academic => "academic",
            DomainClass::Encyclopedia => "encyclopedia",
            DomainClass::CulturalMedia => "cultural_media",
            DomainClass::GeneralWeb => "general_web",
            DomainClass::Unclassified => "unclassified",
        }
    }
}

/// Base credibility of one source URL
pub fn source_score(url: &str) -> f64 {
    DomainClass::classify(url).base_score()
}

/// Site a source URL belongs to; pages on one site are not independent
///
/// The host without a leading `www.`, or the raw text when it has none.
pub fn source_site(raw_url: &str) -> String {
    Url::parse(raw_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_lowercase))
        .map(|host| host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
        .unwrap_or_else(|| raw_url.trim().to_string())
}

/// Bonus for the first corroborating source; halves for each one after
pub const CORROBORATION_BONUS: f64 = 0.05;

/// Cap on the total corroboration bonus
pub const CORROBORATION_CAP: f64 = 0.15;

/// Penalty per open conflict on a record
pub const CONFLICT_PENALTY: f64 = 0.10;

/// Scores evidence records
#[derive(Debug, Clone, PartialEq)]
pub struct CredibilityScorer {
    corroboration_bonus: f64,
    corroboration_cap: f64,
    conflict_penalty: f64,
}

impl CredibilityScorer {
    /// Scorer with the standard weights
    pub fn new() -> Self {
        Self {
            corroboration_bonus: CORROBORATION_BONUS,
            corroboration_cap: CORROBORATION_CAP,
            conflict_penalty: CONFLICT_PENALTY,
        }
    }

    /// Credibility of one record given its open conflict count
    pub fn credibility_of(&self, evidence: &Evidence, open_conflicts: usize) -> f64 {
        let base = evidence
            .source_urls
            .iter()
            .map(|url| source_score(url))
            .fold(0.0_f64, f64::max);

        let sites: BTreeSet<String> = evidence.source_urls.iter().map(|url| source_site(url)).collect();
        let extra_sources = sites.len().saturating_sub(1);
        let mut bonus = 0.0;
        let mut step = self.corroboration_bonus;
        for _ in 0..extra_sources {
            bonus += step;
            step *= 0.5;
        }
        let bonus = bonus.min(self.corroboration_cap);

        let penalty = self.conflict_penalty * open_conflicts as f64;
        (base + bonus - penalty).clamp(0.0, 1.0)
    }

    /// Recompute every record's credibility and every conflict candidate's weight
    pub fn score(&self, set: &mut EvidenceSet) {
        let conflict_counts: Vec<_> = set.iter().map(|e| (e.id, set.conflicts_for(e.id))).collect();

        for (id, open) in conflict_counts {
            if let Some(evidence) = set.get_mut(id) {
                evidence.credibility = self.credibility_of(evidence, open);
            }
        }

        for conflict in set.conflicts_mut() {
            for candidate in conflict.candidates.iter_mut() {
                candidate.credibility = source_score(&candidate.source_url);
            }
        }
    }
}

impl Default for CredibilityScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relicseek_domain::{CandidateValue, EvidenceId};
    use std::collections::BTreeMap;

    fn evidence(urls: &[&str]) -> Evidence {
        let mut e = Evidence::new("k", "n", urls[0], BTreeMap::new(), "", 1);
        for url in &urls[1..] {
            e.source_urls.insert(url.to_string());
        }
        e
    }

    #[test]
    fn test_classification() {
        assert_eq!(DomainClass::classify("https://www.dpm.org.cn/collection/1"), DomainClass::Museum);
        assert_eq!(DomainClass::classify("https://www.gansu.gov.cn/x"), DomainClass::Museum);
        assert_eq!(DomainClass::classify("https://history.pku.edu.cn/a"), DomainClass::Academic);
        assert_eq!(DomainClass::classify("https://zh.wikipedia.org/wiki/x"), DomainClass::Encyclopedia);
        assert_eq!(DomainClass::classify("https://baike.baidu.com/item/x"), DomainClass::Encyclopedia);
        assert_eq!(DomainClass::classify("https://www.heritage-daily.com/x"), DomainClass::CulturalMedia);
        assert_eq!(DomainClass::classify("https://blog.example.com/x"), DomainClass::GeneralWeb);
        assert_eq!(DomainClass::classify("not a url"), DomainClass::Unclassified);
        assert_eq!(DomainClass::classify("ftp://museum.org/x"), DomainClass::Unclassified);
    }

    #[test]
    fn test_single_source_gets_base_score() {
        let scorer = CredibilityScorer::new();
        let e = evidence(&["https://www.chnmuseum.cn/a"]);
        assert!((scorer.credibility_of(&e, 0) - 0.90).abs() < 1e-9);
    }

    #[test]
    fn test_corroboration_bonus_halves_and_caps() {
        let scorer = CredibilityScorer::new();
        let two = evidence(&["https://a.example.com", "https://b.example.com"]);
        assert!((scorer.credibility_of(&two, 0) - 0.40).abs() < 1e-9);

        let three = evidence(&["https://a.example.com", "https://b.example.com", "https://c.example.com"]);
        assert!((scorer.credibility_of(&three, 0) - 0.425).abs() < 1e-9);

        let many: Vec<String> = (0..20).map(|i| format!("https://s{}.example.com", i)).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let capped = scorer.credibility_of(&evidence(&refs), 0);
        assert!(capped <= 0.35 + CORROBORATION_CAP + 1e-9);
    }

    #[test]
    fn test_pages_on_one_site_are_one_source() {
        let scorer = CredibilityScorer::new();
        let same_site = evidence(&[
            "https://blog.example.com/a",
            "https://blog.example.com/b",
            "https://www.blog.example.com/c",
        ]);
        assert!((scorer.credibility_of(&same_site, 0) - 0.35).abs() < 1e-9);

        let two_sites = evidence(&["https://blog.example.com/a", "https://news.example.org/b"]);
        assert!((scorer.credibility_of(&two_sites, 0) - 0.40).abs() < 1e-9);
    }

    #[test]
    fn test_source_site() {
        assert_eq!(source_site("https://www.chnmuseum.cn/zp/1"), "chnmuseum.cn");
        assert_eq!(source_site("https://Baike.Baidu.com/item/x"), "baike.baidu.com");
        assert_eq!(source_site("not a url"), "not a url");
    }

    #[test]
    fn test_conflicts_lower_credibility_and_clamp() {
        let scorer = CredibilityScorer::new();
        let e = evidence(&["https://www.museum.example/a"]);
        assert!((scorer.credibility_of(&e, 2) - 0.70).abs() < 1e-9);
        let weak = evidence(&["not a url"]);
        assert_eq!(scorer.credibility_of(&weak, 5), 0.0);
    }

    #[test]
    fn test_score_is_deterministic() {
        let scorer = CredibilityScorer::new();
        let mut set = EvidenceSet::new();
        set.insert(evidence(&["https://zh.wikipedia.org/a", "https://blog.example.com/b"]));

        let id = EvidenceId::from_key("k");
        let conflict = set.conflict_entry(id, "material");
        conflict.add_candidate(CandidateValue {
            value: "bronze".into(),
            evidence_id: id,
            source_url: "https://zh.wikipedia.org/a".into(),
            credibility: 0.0,
        });

        scorer.score(&mut set);
        let first = set.clone();
        scorer.score(&mut set);
        assert_eq!(first, set);

        assert!((set.get(id).unwrap().credibility - 0.55).abs() < 1e-9);
        assert_eq!(set.conflict(id, "material").unwrap().candidates[0].credibility, 0.60);
    }
}
