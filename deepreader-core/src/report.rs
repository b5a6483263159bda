//! Markdown formatting of the final report.
//!
//! Each section formats independently. A section that arrives in the wrong
//! shape formats to a fixed "not available" message instead of failing, so
//! one bad section never blocks the others.

use serde_json::Value;

use crate::types::{DebateItem, DraftSection, Field, Report};

pub const NO_DRAFT_REPORT: &str = "The final report could not be generated.";
pub const NO_CHAPTER_SUMMARIES: &str = "No chapter summaries are available.";
pub const NO_THEMATIC_ANALYSIS: &str = "No thematic analysis is available.";
pub const NO_DEBATE_ROUNDS: &str = "No debate transcript is available.";

/// The four result tabs, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportTab {
    #[default]
    DraftReport,
    ChapterSummaries,
    ThematicAnalysis,
    DebateRounds,
}

impl ReportTab {
    pub const ALL: [ReportTab; 4] = [
        ReportTab::DraftReport,
        ReportTab::ChapterSummaries,
        ReportTab::ThematicAnalysis,
        ReportTab::DebateRounds,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ReportTab::DraftReport => "Draft Report",
            ReportTab::ChapterSummaries => "Chapter Summaries",
            ReportTab::ThematicAnalysis => "Thematic Analysis",
            ReportTab::DebateRounds => "Debate",
        }
    }

    /// Base file name used when exporting this tab.
    pub fn file_stem(self) -> &'static str {
        match self {
            ReportTab::DraftReport => "draft_report",
            ReportTab::ChapterSummaries => "chapter_summary",
            ReportTab::ThematicAnalysis => "thematic_analysis",
            ReportTab::DebateRounds => "debate_questions",
        }
    }

    /// Text shown when the payload carried nothing for this tab.
    pub fn placeholder(self) -> &'static str {
        match self {
            ReportTab::DraftReport => NO_DRAFT_REPORT,
            ReportTab::ChapterSummaries => NO_CHAPTER_SUMMARIES,
            ReportTab::ThematicAnalysis => NO_THEMATIC_ANALYSIS,
            ReportTab::DebateRounds => NO_DEBATE_ROUNDS,
        }
    }

    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        let i = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(i + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Rendered Markdown per tab. `None` means the payload had no such section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportTabs {
    pub draft_report: Option<String>,
    pub chapter_summaries: Option<String>,
    pub thematic_analysis: Option<String>,
    pub debate_rounds: Option<String>,
}

impl ReportTabs {
    /// Format every section present in a `final_state` payload.
    pub fn from_final_state(final_state: &Value) -> Self {
        let report = Report::from_value(final_state);
        Self {
            draft_report: (!report.draft_report.is_absent())
                .then(|| format_draft_report(&report.draft_report)),
            chapter_summaries: (!report.chapter_summaries.is_absent())
                .then(|| format_chapter_summaries(&report.chapter_summaries)),
            thematic_analysis: (!report.thematic_analysis.is_absent())
                .then(|| format_thematic_analysis(&report.thematic_analysis)),
            debate_rounds: (!report.raw_reviewer_outputs.is_absent())
                .then(|| format_debate_rounds(&report.raw_reviewer_outputs)),
        }
    }

    pub fn get(&self, tab: ReportTab) -> Option<&str> {
        match tab {
            ReportTab::DraftReport => self.draft_report.as_deref(),
            ReportTab::ChapterSummaries => self.chapter_summaries.as_deref(),
            ReportTab::ThematicAnalysis => self.thematic_analysis.as_deref(),
            ReportTab::DebateRounds => self.debate_rounds.as_deref(),
        }
    }

    /// Markdown for a tab, or its placeholder.
    pub fn text(&self, tab: ReportTab) -> &str {
        self.get(tab).unwrap_or_else(|| tab.placeholder())
    }

    /// Tabs that have content, in display order.
    pub fn present(&self) -> impl Iterator<Item = (ReportTab, &str)> {
        ReportTab::ALL
            .into_iter()
            .filter_map(move |tab| self.get(tab).map(|md| (tab, md)))
    }

    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

/// Format the draft report tree.
///
/// Sections are walked depth-first, pre-order; roots are level-1 headings.
pub fn format_draft_report(draft: &Field<Vec<DraftSection>>) -> String {
    let sections = match draft {
        Field::Present(sections) => sections,
        _ => return NO_DRAFT_REPORT.to_string(),
    };

    let mut md = String::new();
    write_sections(&mut md, sections, 1);
    md
}

fn write_sections(md: &mut String, sections: &[DraftSection], level: usize) {
    for section in sections {
        let title = section.title.as_deref().unwrap_or("Untitled");
        md.push_str(&format!("{} {}\n\n", "#".repeat(level), title));

        if let Some(brief) = &section.content_brief {
            md.push_str(&format!("_{}_\n\n", brief));
        }

        if !section.written_content.is_empty() {
            md.push_str(&section.written_content.join("\n\n"));
            md.push_str("\n\n");
        }

        write_sections(md, &section.children, level + 1);
    }
}

/// Format chapter summaries in the order the backend sent them.
pub fn format_chapter_summaries(summaries: &Field<Vec<(String, String)>>) -> String {
    let entries = match summaries {
        Field::Present(entries) => entries,
        _ => return NO_CHAPTER_SUMMARIES.to_string(),
    };

    let mut md = String::from("# Chapter Summaries\n\n");
    for (title, summary) in entries {
        md.push_str(&format!("## {}\n\n{}\n\n", title, summary));
    }
    md
}

/// Format the thematic analysis with humanized keys.
pub fn format_thematic_analysis(analysis: &Field<Vec<(String, String)>>) -> String {
    let entries = match analysis {
        Field::Present(entries) => entries,
        _ => return NO_THEMATIC_ANALYSIS.to_string(),
    };

    let mut md = String::from("# Thematic Analysis\n\n");
    for (key, value) in entries {
        md.push_str(&format!("## {}\n\n{}\n\n", humanize_key(key), value));
    }
    md
}

/// Format reviewer debate rounds.
///
/// Every round gets a heading; rounds that are not lists contribute no
/// questions.
pub fn format_debate_rounds(rounds: &Field<Vec<Option<Vec<DebateItem>>>>) -> String {
    let rounds = match rounds {
        Field::Present(rounds) => rounds,
        _ => return NO_DEBATE_ROUNDS.to_string(),
    };

    let mut md = String::from("# Critical Debate Q&A\n\n");
    for (i, round) in rounds.iter().enumerate() {
        md.push_str(&format!("## Debate Round {}\n\n", i + 1));
        for item in round.iter().flatten() {
            let question = item.question.as_deref().unwrap_or("N/A");
            let answer = item.answer.as_deref().unwrap_or("No answer");
            md.push_str(&format!(
                "### Question: {}\n\n**Answer:** {}\n\n",
                question, answer
            ));
        }
    }
    md
}

/// `main_theme` -> `Main Theme`.
///
/// Underscores become spaces and the first character of every word is
/// uppercased; the rest of each word is left alone.
pub fn humanize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut prev_is_word = false;
    for c in key.chars() {
        let c = if c == '_' { ' ' } else { c };
        let is_word = c.is_ascii_alphanumeric();
        if is_word && !prev_is_word {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
        prev_is_word = is_word;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_draft_report_order_and_levels() {
        let tabs = ReportTabs::from_final_state(&json!({
            "draft_report": [{
                "title": "A",
                "written_content": ["p1"],
                "children": [{"title": "B", "written_content": ["p2"]}]
            }]
        }));
        assert_eq!(
            tabs.draft_report.as_deref(),
            Some("# A\n\np1\n\n## B\n\np2\n\n")
        );
    }

    #[test]
    fn test_draft_report_brief_siblings_and_untitled() {
        let md = format_draft_report(&Field::Present(vec![
            DraftSection {
                title: Some("Intro".to_string()),
                content_brief: Some("why".to_string()),
                written_content: vec!["a".to_string(), "b".to_string()],
                children: vec![DraftSection {
                    title: None,
                    ..Default::default()
                }],
            },
            DraftSection {
                title: Some("Outro".to_string()),
                ..Default::default()
            },
        ]));
        assert_eq!(
            md,
            "# Intro\n\n_why_\n\na\n\nb\n\n## Untitled\n\n# Outro\n\n"
        );
    }

    #[test]
    fn test_draft_report_malformed_falls_back() {
        let tabs = ReportTabs::from_final_state(&json!({"draft_report": {"title": "x"}}));
        assert_eq!(tabs.draft_report.as_deref(), Some(NO_DRAFT_REPORT));
    }

    #[test]
    fn test_chapter_summaries_keep_payload_order() {
        let tabs = ReportTabs::from_final_state(&json!({
            "chapter_summaries": {"Zeta": "last letter", "Alpha": "first letter"}
        }));
        assert_eq!(
            tabs.chapter_summaries.as_deref(),
            Some("# Chapter Summaries\n\n## Zeta\n\nlast letter\n\n## Alpha\n\nfirst letter\n\n")
        );
    }

    #[test]
    fn test_thematic_analysis_humanizes_keys() {
        let tabs = ReportTabs::from_final_state(&json!({"thematic_analysis": {"main_theme": "x"}}));
        assert_eq!(
            tabs.thematic_analysis.as_deref(),
            Some("# Thematic Analysis\n\n## Main Theme\n\nx\n\n")
        );
    }

    #[test]
    fn test_humanize_key() {
        assert_eq!(humanize_key("main_theme"), "Main Theme");
        assert_eq!(humanize_key("core_argument_chain"), "Core Argument Chain");
        assert_eq!(humanize_key("already Spaced"), "Already Spaced");
        assert_eq!(humanize_key("x-ray_vision"), "X-Ray Vision");
        assert_eq!(humanize_key("mixedCase_key"), "MixedCase Key");
        assert_eq!(humanize_key(""), "");
    }

    #[test]
    fn test_debate_rounds() {
        let tabs = ReportTabs::from_final_state(&json!({
            "raw_reviewer_outputs": [
                [{"question": "Is it sound?", "content_retrieve_answer": "Mostly."}, {}],
                "not a round"
            ]
        }));
        assert_eq!(
            tabs.debate_rounds.as_deref(),
            Some(
                "# Critical Debate Q&A\n\n\
                 ## Debate Round 1\n\n\
                 ### Question: Is it sound?\n\n**Answer:** Mostly.\n\n\
                 ### Question: N/A\n\n**Answer:** No answer\n\n\
                 ## Debate Round 2\n\n"
            )
        );
    }

    #[test]
    fn test_missing_sections_render_nothing() {
        let tabs = ReportTabs::from_final_state(&json!({"something_else": 1}));
        assert!(tabs.is_empty());
        assert_eq!(tabs.text(ReportTab::DebateRounds), NO_DEBATE_ROUNDS);
    }

    #[test]
    fn test_rendering_is_repeatable() {
        let state = json!({
            "draft_report": [{"title": "A", "children": [{"title": "B"}]}],
            "chapter_summaries": {"c1": "s1"},
            "thematic_analysis": {"k": "v"},
            "raw_reviewer_outputs": [[{"question": "q"}]]
        });
        let before = state.clone();
        let first = ReportTabs::from_final_state(&state);
        let second = ReportTabs::from_final_state(&state);
        assert_eq!(first, second);
        assert_eq!(state, before);
        assert_eq!(first.present().count(), 4);
    }

    #[test]
    fn test_tab_cycling() {
        assert_eq!(ReportTab::DraftReport.next(), ReportTab::ChapterSummaries);
        assert_eq!(ReportTab::DebateRounds.next(), ReportTab::DraftReport);
        assert_eq!(ReportTab::DraftReport.previous(), ReportTab::DebateRounds);
    }
}
