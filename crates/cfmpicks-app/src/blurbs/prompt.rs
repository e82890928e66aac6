// Prompt text for matchup previews, plus the template used when no model is
// available.

use cfmpicks_core::model::Matchup;

pub fn system_prompt() -> &'static str {
    "You write short, punchy previews for a friends-only Madden franchise \
     pick'em league. Two or three sentences, no more than 60 words. Mention \
     both teams and their records when given. Playful trash talk is fine; \
     never predict a certain winner and never invent player names or stats."
}

fn record_or_unknown(record: Option<&str>) -> &str {
    match record {
        Some(r) if !r.trim().is_empty() => r,
        _ => "record unknown",
    }
}

/// User message describing a single matchup.
pub fn matchup_prompt(m: &Matchup) -> String {
    format!(
        "Week {week} matchup.\n\
         Home: {home} ({home_record})\n\
         Away: {away} ({away_record})\n\
         Write the preview.",
        week = m.week,
        home = m.home_team,
        home_record = record_or_unknown(m.home_record.as_deref()),
        away = m.away_team,
        away_record = record_or_unknown(m.away_record.as_deref()),
    )
}

/// Deterministic blurb built from the matchup itself.
pub fn template_blurb(m: &Matchup) -> String {
    match (m.home_record.as_deref(), m.away_record.as_deref()) {
        (Some(h), Some(a)) => format!(
            "Week {}: {} ({}) host {} ({}). Make your pick before kickoff.",
            m.week, m.home_team, h, m.away_team, a
        ),
        _ => format!(
            "Week {}: {} host {}. Make your pick before kickoff.",
            m.week, m.home_team, m.away_team
        ),
    }
}
