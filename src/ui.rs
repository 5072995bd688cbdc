use std::io::{self, IsTerminal};

use crate::app::{AttachmentView, BoardColumnView, ClientView, NoteView, TimelineEntry, UserView};
use crate::domain::stage::Stage;
use crate::query::ClientListFilter;
use crate::stats::PipelineStats;

pub fn print_client_list(clients: &[ClientView], search: Option<&str>, filter: &ClientListFilter) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Clients"));
    if let Some(summary) = filter_summary(search, filter) {
        println!("{}", palette.dim(&format!("filters: {summary}")));
    }

    if clients.is_empty() {
        println!("{}", palette.dim("no clients matched"));
        return;
    }

    for client in clients {
        println!("{}", format_client_row(client, &palette));
    }
    println!("{}", palette.dim(&format!("{} client(s)", clients.len())));
}

fn format_client_row(client: &ClientView, palette: &Palette) -> String {
    let mut line = format!(
        "{} {} {}",
        palette.id(&client.id),
        palette.stage(client.stage, client.is_dropped),
        client.company_name
    );
    if !client.contact_person.is_empty() {
        line.push_str(&palette.dim(&format!(" · {}", client.contact_person)));
    }
    if let Some(budget) = budget_label(client) {
        line.push(' ');
        line.push_str(&palette.budget(&budget));
    }
    if client.assigned_bde.is_some() {
        line.push(' ');
        line.push_str(&palette.dim(&format!("@{}", client.assigned_bde_name)));
    }
    line
}

pub fn print_client_show(client: &ClientView) {
    let palette = Palette::auto();
    println!(
        "{} {} {}",
        palette.id(&client.id),
        palette.stage(client.stage, client.is_dropped),
        palette.heading(&client.company_name)
    );
    print_field(&palette, "contact", Some(client.contact_person.as_str()));
    print_field(&palette, "email", client.email.as_deref());
    print_field(&palette, "phone", client.phone.as_deref());
    print_field(&palette, "industry", client.industry.as_deref());
    print_field(&palette, "size", client.company_size.as_deref());
    print_field(&palette, "budget", budget_label(client).as_deref());
    print_field(&palette, "source", client.source.as_deref());
    print_field(&palette, "referrer", client.referrer_name.as_deref());
    print_field(&palette, "owner", Some(client.assigned_bde_name.as_str()));
    print_field(&palette, "status", Some(client.status.as_str()));
    print_field(&palette, "drop reason", client.drop_reason.as_deref());
    print_field(&palette, "created", Some(client.created_at.as_str()));
    print_field(&palette, "last touch", Some(client.last_interaction.as_str()));
    print_field(&palette, "requirements", client.requirements.as_deref());

    if !client.notes.is_empty() {
        println!("{}", palette.heading("Notes"));
        write_notes(&client.notes, &palette);
    }
    if !client.attachments.is_empty() {
        println!("{}", palette.heading("Files"));
        write_attachments(&client.attachments, &palette);
    }
}

pub fn print_notes(notes: &[NoteView]) {
    let palette = Palette::auto();
    if notes.is_empty() {
        println!("{}", palette.dim("no notes"));
        return;
    }
    write_notes(notes, &palette);
}

pub fn print_attachments(attachments: &[AttachmentView]) {
    let palette = Palette::auto();
    if attachments.is_empty() {
        println!("{}", palette.dim("no files"));
        return;
    }
    write_attachments(attachments, &palette);
}

fn write_notes(notes: &[NoteView], palette: &Palette) {
    for note in notes {
        println!("  {}", format_note(note, palette));
        for attachment in &note.attachments {
            println!(
                "    {} {}",
                palette.dim("+"),
                palette.dim(&attachment.original_filename)
            );
        }
    }
}

fn write_attachments(attachments: &[AttachmentView], palette: &Palette) {
    for attachment in attachments {
        println!(
            "  {} {} {}",
            palette.id(&attachment.id),
            attachment.original_filename,
            palette.dim(&format!(
                "({}, {} bytes)",
                attachment.media_type, attachment.size_bytes
            ))
        );
    }
}

fn print_field(palette: &Palette, label: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
        println!("  {} {}", palette.dim(&format!("{label:<12}")), value);
    }
}

fn format_note(note: &NoteView, palette: &Palette) -> String {
    if note.legacy {
        return format!("{} {}", palette.dim("[legacy]"), note.text);
    }
    let stamp = note.created_at.as_deref().unwrap_or_default();
    let author = note.author.as_deref().unwrap_or_default();
    format!("{} {}", palette.dim(&format!("{stamp} {author}:")), note.text)
}

pub fn print_timeline(client: &ClientView, entries: &[TimelineEntry]) {
    let palette = Palette::auto();
    println!(
        "{} {}",
        palette.heading("Timeline"),
        palette.dim(&format!("{} ({})", client.company_name, client.id))
    );
    if entries.is_empty() {
        println!("{}", palette.dim("no activity recorded"));
        return;
    }
    for entry in entries {
        let stamp = crate::clock::format_timestamp(entry.event.occurred_at);
        println!(
            "  {} {} {}",
            palette.dim(&stamp),
            palette.id(&entry.event.title),
            entry.event.description
        );
        println!("    {}", palette.dim(&format!("by {}", entry.actor_name)));
    }
}

pub fn print_board(columns: &[BoardColumnView]) {
    let palette = Palette::auto();
    for column in columns {
        println!(
            "{} {}",
            palette.stage(column.stage, false),
            palette.dim(&format!("{} card(s)", column.clients.len()))
        );
        for client in &column.clients {
            println!("  {} {}", palette.id(&client.id), client.company_name);
        }
    }
}

pub fn print_stats(stats: &PipelineStats) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Pipeline"));
    println!(
        "  total={} active={} dropped={} converted={}",
        stats.total, stats.active, stats.dropped, stats.converted
    );
    for entry in &stats.by_stage {
        println!(
            "  {} {}",
            palette.stage(entry.stage, false),
            entry.count
        );
    }
}

pub fn print_users(users: &[UserView]) {
    let palette = Palette::auto();
    if users.is_empty() {
        println!("{}", palette.dim("no users"));
        return;
    }
    for user in users {
        println!(
            "{} {} {} {}",
            palette.id(&user.id),
            user.name,
            palette.dim(&format!("<{}>", user.email)),
            palette.type_label(&format!("{} {}", user.role.as_str(), user.status.as_str()))
        );
    }
}

fn budget_label(client: &ClientView) -> Option<String> {
    let amount = client.budget?;
    let currency = client.budget_currency.as_deref().unwrap_or_default();
    Some(format!("{amount:.0} {currency}").trim_end().to_string())
}

fn filter_summary(search: Option<&str>, filter: &ClientListFilter) -> Option<String> {
    let scalars = [
        ("stage", filter.stage.as_deref()),
        ("industry", filter.industry.as_deref()),
        ("size", filter.company_size.as_deref()),
        ("bde", filter.assigned_bde.as_deref()),
        ("budget", filter.budget_range.as_deref()),
        ("date", filter.date_range.as_deref()),
        ("dropped", filter.dropped.as_deref()),
    ];
    let mut parts = Vec::new();
    if let Some(search) = search.map(str::trim).filter(|search| !search.is_empty()) {
        parts.push(format!("search={search}"));
    }
    parts.extend(
        scalars
            .into_iter()
            .filter_map(|(key, value)| value.and_then(non_empty).map(|value| format!("{key}={value}"))),
    );

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn non_empty(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(trimmed)
    }
}

pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    pub fn id(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    pub fn stage(&self, stage: Stage, dropped: bool) -> String {
        if dropped {
            return self.paint("31", &format!("[DROPPED {}]", stage.number()));
        }
        self.paint(
            stage_color_code(stage),
            &format!("[{} {}]", stage.number(), stage.label().to_ascii_uppercase()),
        )
    }

    fn type_label(&self, text: &str) -> String {
        self.paint("35", &format!("({text})"))
    }

    fn budget(&self, text: &str) -> String {
        self.paint("90", text)
    }
}

fn stage_color_code(stage: Stage) -> &'static str {
    match stage {
        Stage::FirstContact => "34",
        Stage::TechnicalDiscussion => "36",
        Stage::PricingProposal => "33",
        Stage::Negotiation => "35",
        Stage::ConvertedClient => "32",
    }
}

#[cfg(test)]
mod tests {
    use super::{filter_summary, Palette};
    use crate::domain::stage::Stage;
    use crate::query::ClientListFilter;

    #[test]
    fn filter_summary_formats_only_active_filters() {
        let filter = ClientListFilter {
            stage: Some("3".to_string()),
            industry: Some("Retail".to_string()),
            budget_range: Some("all".to_string()),
            dropped: Some("false".to_string()),
            ..ClientListFilter::default()
        };

        let summary = filter_summary(Some("acme"), &filter).expect("summary should exist");
        assert_eq!(summary, "search=acme stage=3 industry=Retail dropped=false");
    }

    #[test]
    fn filter_summary_is_none_for_empty_filters() {
        assert!(filter_summary(None, &ClientListFilter::default()).is_none());
        assert!(filter_summary(Some("  "), &ClientListFilter::default()).is_none());
    }

    #[test]
    fn plain_palette_labels_stages_and_drops() {
        let palette = Palette { enabled: false };
        assert_eq!(
            palette.stage(Stage::PricingProposal, false),
            "[3 PRICING PROPOSAL]"
        );
        assert_eq!(palette.stage(Stage::Negotiation, true), "[DROPPED 4]");
    }
}
