use crate::constants::{ARTIST_REPORT_SUFFIX, DEFAULT_REPORT_FILE};
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::PipelineSummary;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

static UNSAFE_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}_\-]").expect("valid slug regex"));

struct ComparisonProfile {
    letter: char,
    name: &'static str,
    similarity: u8,
    sound_profile: &'static str,
    audience_overlap: u8,
    fee_reduction: u8,
    economic_impact: &'static str,
    best_for: &'static str,
    genres: &'static str,
}

const COMPARISONS: [ComparisonProfile; 3] = [
    ComparisonProfile {
        letter: 'A',
        name: "Coldplay",
        similarity: 78,
        sound_profile: "Energetic, expansive, and pop-oriented with dynamic arrangements",
        audience_overlap: 65,
        fee_reduction: 40,
        economic_impact: "$10,000–$16,000 per sync placement",
        best_for: "Uplifting, cinematic scenes; dynamic commercials",
        genres: "Pop, alternative, indie pop",
    },
    ComparisonProfile {
        letter: 'B',
        name: "Imagine Dragons",
        similarity: 75,
        sound_profile: "Anthemic, modern rock-pop with driving percussion",
        audience_overlap: 60,
        fee_reduction: 45,
        economic_impact: "$12,000–$18,000 per placement",
        best_for: "High-energy commercials, sports promos",
        genres: "Modern rock, alternative pop",
    },
    ComparisonProfile {
        letter: 'C',
        name: "Maroon 5",
        similarity: 70,
        sound_profile: "Polished, radio-friendly pop-rock with catchy hooks",
        audience_overlap: 55,
        fee_reduction: 50,
        economic_impact: "$15,000–$22,000 per sync deal",
        best_for: "Mainstream advertising, lifestyle programming",
        genres: "Pop, soft rock, urban contemporary",
    },
];

const GENRE_SECTIONS: [(&str, [&str; 3]); 6] = [
    (
        "Breakout Genres",
        ["Pop: 🔥 +25% growth", "Afrobeat: 🔥 +18% growth", "Ambient: 🔥 +15% growth"],
    ),
    (
        "Declining Genres",
        ["Rock: 📉 -10% drop", "Country: 📉 -8% drop", "Metal: 📉 -5% drop"],
    ),
    (
        "Early Detection Radar",
        [
            "Synthwave: 🚀 Trending early",
            "Lo-fi Hip Hop: 🚀 Emerging",
            "Hyperpop: 🚀 Gaining traction",
        ],
    ),
    (
        "Cross-Genre Flow",
        [
            "Notable movement between EDM and Hip-Hop",
            "Increasing fusion of Jazz and Electronic",
            "Pop and R&B convergence accelerating",
        ],
    ),
    (
        "Next Week Predictions",
        [
            "Afrobeat is projected to rise by 20%",
            "Ambient music expected to grow by 15%",
            "Synthwave likely to break into mainstream",
        ],
    ),
    (
        "Strategic Insights",
        [
            "Gen Z favoring ambient & instrumental genres",
            "Increased demand for genre-blending tracks",
            "Rising importance of TikTok in genre discovery",
        ],
    ),
];

/// Whether `configured` is exactly the set of artists the report compares against.
pub fn covers_comparisons(configured: &[String]) -> bool {
    configured.len() == COMPARISONS.len()
        && COMPARISONS
            .iter()
            .all(|p| configured.iter().any(|c| c.trim().eq_ignore_ascii_case(p.name)))
}

/// File-name-safe form of an artist name.
pub fn slugify(artist: &str) -> String {
    let lowered = artist.trim().to_lowercase().replace(' ', "_");
    let slug = UNSAFE_FILE_CHARS.replace_all(&lowered, "").into_owned();
    if slug.is_empty() {
        "artist".to_string()
    } else {
        slug
    }
}

/// Writes the Markdown report.
///
/// The body is a fixed template; only the artist name and, when a run
/// summary is supplied, the methodology status lines vary between runs.
pub struct ReportGenerator {
    reports_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    pub fn default_report_path(&self) -> PathBuf {
        self.reports_dir.join(DEFAULT_REPORT_FILE)
    }

    pub fn report_path_for(&self, artist: &str) -> PathBuf {
        self.reports_dir
            .join(format!("{}{}", slugify(artist), ARTIST_REPORT_SUFFIX))
    }

    /// Render and write the report to `path`, replacing any previous file.
    pub fn save_report(
        &self,
        path: &Path,
        artist: &str,
        summary: Option<&PipelineSummary>,
    ) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, render(artist, summary))?;
        metrics::pipeline::report_generated();
        info!("📝 Report written to {}", path.display());
        Ok(())
    }
}

/// Render the full report body.
pub fn render(artist: &str, summary: Option<&PipelineSummary>) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_body(&mut out, artist, summary);
    out
}

fn write_body(
    out: &mut String,
    artist: &str,
    summary: Option<&PipelineSummary>,
) -> std::fmt::Result {
    writeln!(out, "# Weekly Genre Pulse Report\n")?;
    for (title, bullets) in GENRE_SECTIONS.iter() {
        writeln!(out, "## {}", title)?;
        for bullet in bullets {
            writeln!(out, "- {}", bullet)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "# Emerging Artist Analysis: {}\n", artist)?;
    writeln!(out, "## Overview")?;
    writeln!(
        out,
        "This report evaluates {}'s sonic identity, audience engagement, and production quality \
         by comparing it with established artists. The analysis details sync licensing savings \
         estimates, scene suitability, genre fit, and strategic market insights, providing \
         actionable data for music supervisors, A&R teams, music producers, and labels.\n",
        artist
    )?;

    writeln!(out, "## 1. Established Artist Overlap & Detailed Comparisons\n")?;
    for profile in COMPARISONS.iter() {
        writeln!(out, "### {}. {}", profile.letter, profile.name)?;
        writeln!(out, "- Similarity Score: {}%", profile.similarity)?;
        writeln!(out, "- Sound Profile Overlap:")?;
        writeln!(out, "  - {}", profile.sound_profile)?;
        writeln!(out, "- Audience Overlap: {}%", profile.audience_overlap)?;
        writeln!(out, "- Sync Licensing Savings:")?;
        writeln!(out, "  - Fee Reduction: {}% savings", profile.fee_reduction)?;
        writeln!(out, "  - Economic Impact: {}", profile.economic_impact)?;
        writeln!(out, "- Scene Suitability & Genre Fit:")?;
        writeln!(out, "  - Best for: {}", profile.best_for)?;
        writeln!(out, "  - Genres: {}\n", profile.genres)?;
    }

    writeln!(out, "## 2. Enhanced Strategic Analysis\n")?;
    writeln!(out, "### Audio Feature & Mood Analysis")?;
    writeln!(out, "- Scene & Genre Suitability Scores:")?;
    writeln!(out, "  - Cinematic/Uplifting Scenes: 85/100")?;
    writeln!(out, "  - High-Energy Commercials: 80/100")?;
    writeln!(out, "  - Lifestyle/Urban Settings: 75/100\n")?;
    writeln!(out, "### Market Projections")?;
    writeln!(out, "- Audience Growth: 15–20% increase in streaming and social engagement")?;
    writeln!(out, "- Sync ROI: 25% improvement compared to industry benchmarks\n")?;

    writeln!(out, "## 3. Conclusion & Recommendations\n")?;
    writeln!(out, "### Key Findings")?;
    writeln!(out, "- Cost-Efficient Sync Licensing: 40–50% savings per placement")?;
    writeln!(out, "- High scene suitability for various media applications")?;
    writeln!(out, "- Strong commercial potential and audience growth")?;
    writeln!(out, "- Strategic value for both licensing and talent development\n")?;
    writeln!(out, "### Final Recommendations")?;
    writeln!(
        out,
        "- For Music Supervisors: Exceptional, budget-friendly alternative for sync opportunities"
    )?;
    writeln!(out, "- For Labels and A&R Teams: Strong potential as a valuable new signing\n")?;

    writeln!(out, "## Data Sources & Methodology")?;
    writeln!(out, "- Data from Spotify, YouTube, and Last.fm, processed using AI forecasting")?;
    writeln!(out, "- Analysis based on audio features, audience metrics, and market trends")?;
    writeln!(out, "- Predictions generated with an automatic ARIMA model")?;

    if let Some(summary) = summary {
        writeln!(out, "\n### Run Status")?;
        writeln!(out, "- Run: {}", summary.run_id)?;
        for (kind, status) in &summary.sources {
            let rows = summary.persisted.get(kind).copied().unwrap_or(0);
            writeln!(out, "- {}: {} ({} rows)", kind, status, rows)?;
        }
        writeln!(out, "- Forecast: {}", summary.analysis)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SECTION_ORDER: [&str; 11] = [
        "# Weekly Genre Pulse Report",
        "## Breakout Genres",
        "## Declining Genres",
        "## Early Detection Radar",
        "## Cross-Genre Flow",
        "## Next Week Predictions",
        "## Strategic Insights",
        "## 1. Established Artist Overlap & Detailed Comparisons",
        "## 2. Enhanced Strategic Analysis",
        "## 3. Conclusion & Recommendations",
        "## Data Sources & Methodology",
    ];

    #[test]
    fn sections_appear_in_fixed_order() {
        let body = render("Nova Sound", None);
        let mut last = 0;
        for heading in SECTION_ORDER {
            let pos = body[last..]
                .find(heading)
                .unwrap_or_else(|| panic!("{} missing or out of order", heading));
            last += pos + heading.len();
        }
        assert!(body.contains("# Emerging Artist Analysis: Nova Sound"));
        assert!(body.contains("### A. Coldplay"));
        assert!(body.contains("### B. Imagine Dragons"));
        assert!(body.contains("### C. Maroon 5"));
        assert!(!body.contains("### Run Status"));
    }

    #[test]
    fn slug_is_safe_for_file_names() {
        assert_eq!(slugify("Nova Sound"), "nova_sound");
        assert_eq!(slugify("AC/DC"), "acdc");
        assert_eq!(slugify("../../etc"), "etc");
        assert_eq!(slugify("!!!"), "artist");
    }

    #[test]
    fn comparison_set_must_match_the_template() {
        let defaults: Vec<String> = crate::constants::COMPARISON_ARTISTS
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(covers_comparisons(&defaults));

        let reordered = vec!["maroon 5".to_string(), "Coldplay".into(), "Imagine Dragons".into()];
        assert!(covers_comparisons(&reordered));

        let swapped = vec!["Coldplay".to_string(), "Imagine Dragons".into(), "Muse".into()];
        assert!(!covers_comparisons(&swapped));
        assert!(!covers_comparisons(&defaults[..2]));
    }

    #[test]
    fn slug_keeps_non_ascii_letters() {
        assert_eq!(slugify("Beyoncé"), "beyoncé");
        assert_eq!(slugify("Björk"), "björk");
        assert_eq!(slugify("Sigur Rós/Live"), "sigur_róslive");

        let generator = ReportGenerator::new("/r");
        let first = generator.report_path_for("米津玄師");
        let second = generator.report_path_for("宇多田ヒカル");
        assert_ne!(first, second);
        assert_eq!(first, PathBuf::from("/r/米津玄師_genre_pulse.md"));
    }

    #[test]
    fn report_paths_live_in_the_reports_dir() {
        let generator = ReportGenerator::new("/tmp/reports");
        assert_eq!(
            generator.default_report_path(),
            PathBuf::from("/tmp/reports/weekly_genre_pulse.md")
        );
        assert_eq!(
            generator.report_path_for("Daft Punk"),
            PathBuf::from("/tmp/reports/daft_punk_genre_pulse.md")
        );
    }

    #[test]
    fn save_creates_directories_and_overwrites() {
        let dir = tempdir().unwrap();
        let generator = ReportGenerator::new(dir.path().join("nested/reports"));
        let path = generator.default_report_path();

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale").unwrap();
        generator.save_report(&path, "Nova Sound", None).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("# Weekly Genre Pulse Report"));
        assert!(!body.contains("stale"));
    }
}
