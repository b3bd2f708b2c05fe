//! Competency taxonomy for Coast Guard evaluations.
//!
//! Each rank group has a fixed set of report categories, and every competency
//! belongs to exactly one of them. Enlisted E7/E8 (chiefs) use a slightly
//! different competency list than E4-E6.

use crate::models::document::RankCategory;

/// Category assigned to competencies outside the taxonomy.
pub const OTHER_CATEGORY: &str = "Other";

type CategoryTable = &'static [(&'static str, &'static [&'static str])];

const OFFICER: CategoryTable = &[
    (
        "Performance of Duties",
        &[
            "Planning & Preparedness",
            "Using Resources",
            "Results/Effectiveness",
            "Adaptability",
            "Professional Competence",
            "Speaking and Listening",
            "Writing",
        ],
    ),
    (
        "Leadership Skills",
        &[
            "Looking Out For Others",
            "Developing Others",
            "Directing Others",
            "Teamwork",
            "Workplace Climate",
            "Evaluations",
        ],
    ),
    (
        "Personal and Professional Qualities",
        &[
            "Initiative",
            "Judgment",
            "Responsibility",
            "Professional Presence",
            "Health and Well Being",
        ],
    ),
];

const ENLISTED_E4_E6: CategoryTable = &[
    (
        "Military",
        &["Military Bearing", "Customs, Courtesies, and Traditions"],
    ),
    (
        "Performance",
        &["Quality of Work", "Technical Proficiency", "Initiative"],
    ),
    (
        "Professional Qualities",
        &[
            "Decision Making and Problem Solving",
            "Military Readiness",
            "Self-Awareness and Learning",
            "Team Building",
        ],
    ),
    (
        "Leadership",
        &[
            "Respect for Others",
            "Accountability and Responsibility",
            "Influencing Others",
            "Effective Communication",
        ],
    ),
];

const ENLISTED_E7_E8: CategoryTable = &[
    (
        "Military",
        &["Military Bearing", "Customs, Courtesies, and Traditions"],
    ),
    (
        "Performance",
        &[
            "Quality of Work",
            "Technical Proficiency",
            "Initiative",
            "Strategic Thinking",
        ],
    ),
    (
        "Professional Qualities",
        &[
            "Decision Making and Problem Solving",
            "Military Readiness",
            "Self-Awareness and Learning",
            "Partnering",
        ],
    ),
    (
        "Leadership",
        &[
            "Respect for Others",
            "Accountability and Responsibility",
            "Workforce Management",
            "Effective Communication",
            "Chiefs Mess Leadership and Participation",
        ],
    ),
];

fn table(rank_category: RankCategory, rank: &str) -> CategoryTable {
    match rank_category {
        RankCategory::Officer => OFFICER,
        RankCategory::Enlisted if matches!(rank, "E7" | "E8") => ENLISTED_E7_E8,
        RankCategory::Enlisted => ENLISTED_E4_E6,
    }
}

/// All competencies available for a rank, in display order.
pub fn competencies(rank_category: RankCategory, rank: &str) -> Vec<&'static str> {
    table(rank_category, rank)
        .iter()
        .flat_map(|(_, list)| list.iter().copied())
        .collect()
}

/// Looks up the report category a competency belongs to.
/// Returns [`OTHER_CATEGORY`] for competencies outside the rank's taxonomy.
pub fn category_for(rank_category: RankCategory, rank: &str, competency: &str) -> &'static str {
    table(rank_category, rank)
        .iter()
        .find(|(_, list)| list.contains(&competency))
        .map(|(category, _)| *category)
        .unwrap_or(OTHER_CATEGORY)
}

/// Report categories in the order they appear on the evaluation form.
pub fn report_categories(rank_category: RankCategory) -> Vec<&'static str> {
    // E4-E6 and E7-E8 share category names.
    let table = match rank_category {
        RankCategory::Officer => OFFICER,
        RankCategory::Enlisted => ENLISTED_E4_E6,
    };
    table.iter().map(|(category, _)| *category).collect()
}

pub fn report_title(rank_category: RankCategory, rank: &str) -> String {
    if rank_category == RankCategory::Officer {
        return "Officer Evaluation Report".to_string();
    }
    let rank_title = match rank {
        "E4" => "Third Class Petty Officer",
        "E5" => "Second Class Petty Officer",
        "E6" => "First Class Petty Officer",
        "E7" => "Chief Petty Officer",
        "E8" => "Senior Chief Petty Officer",
        _ => "Enlisted",
    };
    format!("{rank_title} Evaluation Report")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_officer_lookup() {
        assert_eq!(
            category_for(RankCategory::Officer, "O3", "Teamwork"),
            "Leadership Skills"
        );
        assert_eq!(
            category_for(RankCategory::Officer, "O3", "Writing"),
            "Performance of Duties"
        );
    }

    #[test]
    fn test_chief_only_competency() {
        assert_eq!(
            category_for(RankCategory::Enlisted, "E7", "Strategic Thinking"),
            "Performance"
        );
        assert_eq!(
            category_for(RankCategory::Enlisted, "E5", "Strategic Thinking"),
            OTHER_CATEGORY
        );
    }

    #[test]
    fn test_unknown_competency_is_other() {
        assert_eq!(
            category_for(RankCategory::Officer, "O2", "Basket Weaving"),
            OTHER_CATEGORY
        );
    }

    #[test]
    fn test_competency_counts() {
        assert_eq!(competencies(RankCategory::Officer, "O1").len(), 18);
        assert_eq!(competencies(RankCategory::Enlisted, "E6").len(), 13);
        assert_eq!(competencies(RankCategory::Enlisted, "E8").len(), 15);
    }

    #[test]
    fn test_report_titles() {
        assert_eq!(
            report_title(RankCategory::Officer, "O4"),
            "Officer Evaluation Report"
        );
        assert_eq!(
            report_title(RankCategory::Enlisted, "E7"),
            "Chief Petty Officer Evaluation Report"
        );
        assert_eq!(
            report_title(RankCategory::Enlisted, "E2"),
            "Enlisted Evaluation Report"
        );
        assert_eq!(report_categories(RankCategory::Enlisted).len(), 4);
    }
}
