use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Local, NaiveDate};
use eframe::{
    App, CreationContext, Frame,
    egui::{self, Color32, Context, RichText},
};
use egui_extras::{Column, TableBuilder};

use crate::{
    columns::{self, TITLE},
    config::Settings,
    domain::{DateRange, IssueRecord, IssueState, Severity},
    feed::IssueFeed,
    filter::{DateInterval, FilterKind, FilterValue, format_date_input, parse_date_input},
    range::DateRangeController,
    source,
    table::{CellValue, Formatter, SortKey, TableEngine},
};

pub const APP_NAME: &str = "Issue Dashboard";

const IDLE_REPAINT: Duration = Duration::from_millis(500);
const LOADING_REPAINT: Duration = Duration::from_millis(50);

pub struct DashboardApp {
    range: DateRangeController,
    range_inputs: RangeInputs,
    feed: IssueFeed,
    table: TableEngine<IssueRecord>,
    filter_inputs: HashMap<&'static str, FilterInput>,
    load_state: LoadState,
    settings_warning: Option<String>,
}

impl DashboardApp {
    pub fn new(_cc: &CreationContext<'_>, settings: &Settings, warning: Option<String>) -> Self {
        let range = DateRangeController::current_month();
        let range_inputs = RangeInputs::from_range(range.range());
        Self {
            range,
            range_inputs,
            feed: IssueFeed::new(source::from_settings(settings)),
            table: TableEngine::new(columns::issue_columns()),
            filter_inputs: HashMap::new(),
            load_state: LoadState::NotLoaded,
            settings_warning: warning,
        }
    }

    fn poll_feed(&mut self) {
        if let Some(outcome) = self.feed.poll() {
            match outcome {
                Ok(issues) => {
                    self.table.set_rows(issues);
                    self.load_state = LoadState::Loaded {
                        fetched_at: Local::now(),
                    };
                }
                Err(err) => {
                    self.table.set_rows(Vec::new());
                    self.load_state = LoadState::Failed(err.to_string());
                }
            }
        }
    }

    fn dispatch_range_change(&mut self) {
        if let Some(range) = self.range.take_change() {
            self.feed.request(range);
        }
    }

    fn apply_actions(&mut self, actions: Vec<TableAction>) {
        for action in actions {
            let result = match action {
                TableAction::ToggleSort(id) => self.table.toggle_sort(id).map(|_| ()),
                TableAction::SetFilter(id, value) => self.table.set_filter(id, value),
                TableAction::ClearFilters => {
                    self.table.clear_filters();
                    self.filter_inputs.clear();
                    Ok(())
                }
            };
            if let Err(err) = result {
                tracing::warn!(error = %err, "table update rejected");
            }
        }
    }

    fn render_range_panel(&mut self, ui: &mut egui::Ui) {
        ui.group(|group| {
            group.heading("Date range");
            group.horizontal(|row| {
                row.label("From");
                if let Some(start) = date_input(row, &mut self.range_inputs.start) {
                    self.range.set_start(start);
                }
                row.label("To");
                if let Some(end) = date_input(row, &mut self.range_inputs.end) {
                    self.range.set_end(end);
                }
                if row.button("Current month").clicked() {
                    let month = DateRange::month_of(Local::now().date_naive());
                    self.range.set_start(month.start);
                    self.range.set_end(month.end);
                }
            });
            self.range_inputs.sync(self.range.range());
            let current = self.range.range();
            group.weak(format!(
                "Showing issues from {} to {}",
                current.start.format("%d/%m/%Y"),
                current.end.format("%d/%m/%Y")
            ));
        });
    }

    fn render_issues_panel(&mut self, ui: &mut egui::Ui) {
        ui.group(|group| {
            group.horizontal(|row| {
                row.heading("Issues");
                row.weak(format!("Source: {}", self.feed.source().describe()));
            });
            render_load_status(group, &self.load_state);

            if let LoadState::Failed(_) = self.load_state
                && group.button("Retry").clicked()
            {
                self.range.reissue();
            }

            if self.feed.is_loading() {
                group.horizontal(|row| {
                    row.spinner();
                    row.label("Loading issues…");
                });
                return;
            }

            let mut actions = Vec::new();
            actions.extend(render_quick_search(group, &mut self.filter_inputs));
            group.separator();
            actions.extend(render_issue_table(
                group,
                &self.table,
                &mut self.filter_inputs,
            ));
            group.separator();
            group.horizontal(|row| {
                row.label(format!("Total issues: {}", self.table.visible_count()));
                if self.table.active_filter_count() > 0
                    && row.small_button("Clear filters").clicked()
                {
                    actions.push(TableAction::ClearFilters);
                }
            });
            self.apply_actions(actions);
        });
    }
}

impl App for DashboardApp {
    fn update(&mut self, ctx: &Context, _frame: &mut Frame) {
        self.poll_feed();
        self.dispatch_range_change();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(APP_NAME);
            if let Some(warning) = &self.settings_warning {
                ui.colored_label(ui.visuals().warn_fg_color, warning);
            }
            ui.add_space(8.0);
            self.render_range_panel(ui);
            ui.add_space(12.0);
            egui::ScrollArea::both().show(ui, |area| {
                self.render_issues_panel(area);
            });
        });

        // Edits made this frame should start their fetch without waiting.
        self.dispatch_range_change();
        ctx.request_repaint_after(if self.feed.is_loading() {
            LOADING_REPAINT
        } else {
            IDLE_REPAINT
        });
    }
}

// -----------------------------------------------------------------------------
// Load state
// -----------------------------------------------------------------------------

enum LoadState {
    NotLoaded,
    Loaded { fetched_at: DateTime<Local> },
    Failed(String),
}

fn render_load_status(ui: &mut egui::Ui, state: &LoadState) {
    match state {
        LoadState::NotLoaded => {
            ui.weak("No data fetched yet.");
        }
        LoadState::Loaded { fetched_at } => {
            ui.weak(format!(
                "Last synced {}",
                fetched_at.format("%Y-%m-%d %H:%M:%S")
            ));
        }
        LoadState::Failed(err) => {
            ui.colored_label(
                ui.visuals().error_fg_color,
                format!("Could not load issues: {err}"),
            );
        }
    }
}

// -----------------------------------------------------------------------------
// Date range inputs
// -----------------------------------------------------------------------------

struct RangeInputs {
    start: DateField,
    end: DateField,
}

impl RangeInputs {
    fn from_range(range: DateRange) -> Self {
        Self {
            start: DateField::new(range.start),
            end: DateField::new(range.end),
        }
    }

    /// Shows the controller's (possibly clamped) values in fields the user is
    /// not currently editing.
    fn sync(&mut self, range: DateRange) {
        self.start.sync(range.start);
        self.end.sync(range.end);
    }
}

struct DateField {
    text: String,
    editing: bool,
}

impl DateField {
    fn new(day: NaiveDate) -> Self {
        Self {
            text: format_date_input(day),
            editing: false,
        }
    }

    fn sync(&mut self, day: NaiveDate) {
        if !self.editing {
            self.text = format_date_input(day);
        }
    }
}

/// Returns a date when the field holds a valid edit.
fn date_input(ui: &mut egui::Ui, field: &mut DateField) -> Option<NaiveDate> {
    let response = ui.add(
        egui::TextEdit::singleline(&mut field.text)
            .hint_text("YYYY-MM-DD")
            .desired_width(96.0),
    );
    field.editing = response.has_focus();
    let parsed = parse_date_input(&field.text);
    if parsed.is_none() && !field.text.trim().is_empty() {
        ui.colored_label(ui.visuals().warn_fg_color, "invalid date");
    }
    if response.changed() { parsed } else { None }
}

// -----------------------------------------------------------------------------
// Issue table
// -----------------------------------------------------------------------------

enum TableAction {
    ToggleSort(&'static str),
    SetFilter(&'static str, Option<FilterValue>),
    ClearFilters,
}

/// Text buffers behind a column's filter widget.
#[derive(Default)]
struct FilterInput {
    text: String,
    min: String,
    max: String,
}

impl FilterInput {
    fn to_value(&self, kind: FilterKind) -> Option<FilterValue> {
        let value = match kind {
            FilterKind::None => return None,
            FilterKind::Substring => FilterValue::Substring(self.text.clone()),
            FilterKind::Exact => FilterValue::Exact(self.text.clone()),
            FilterKind::DateInterval => {
                FilterValue::DateInterval(DateInterval::parse(&self.min, &self.max))
            }
        };
        (!value.is_void()).then_some(value)
    }
}

/// Everything a header cell needs, computed before the table borrows the UI.
struct HeaderView {
    id: &'static str,
    title: &'static str,
    sortable: bool,
    sorted: Option<bool>,
    filtered: bool,
    kind: FilterKind,
    formatter: Formatter,
    pre_filtered: usize,
    options: Vec<String>,
    date_hint: Option<(NaiveDate, NaiveDate)>,
}

fn header_views(table: &TableEngine<IssueRecord>) -> Vec<HeaderView> {
    let sort = table.sort();
    table
        .columns()
        .iter()
        .map(|column| {
            let sorted = match sort {
                Some(SortKey { column: active, descending }) if active == column.id => {
                    Some(descending)
                }
                _ => None,
            };
            let options = match column.filter_kind {
                FilterKind::Exact => table.options_for(column.id).unwrap_or_default(),
                _ => Vec::new(),
            };
            let date_hint = match column.filter_kind {
                FilterKind::DateInterval => table.date_bounds_for(column.id).ok().flatten(),
                _ => None,
            };
            HeaderView {
                id: column.id,
                title: column.header,
                sortable: column.sortable,
                sorted,
                filtered: table.filter(column.id).is_some(),
                kind: column.filter_kind,
                formatter: column.formatter,
                pre_filtered: table
                    .pre_filtered_rows(column.id)
                    .map(|rows| rows.len())
                    .unwrap_or_default(),
                options,
                date_hint,
            }
        })
        .collect()
}

fn render_quick_search(
    ui: &mut egui::Ui,
    inputs: &mut HashMap<&'static str, FilterInput>,
) -> Option<TableAction> {
    let input = inputs.entry(TITLE).or_default();
    let response = ui.add(
        egui::TextEdit::singleline(&mut input.text)
            .hint_text("Search by title…")
            .desired_width(320.0),
    );
    response
        .changed()
        .then(|| TableAction::SetFilter(TITLE, input.to_value(FilterKind::Substring)))
}

fn render_issue_table(
    ui: &mut egui::Ui,
    table: &TableEngine<IssueRecord>,
    inputs: &mut HashMap<&'static str, FilterInput>,
) -> Vec<TableAction> {
    let mut actions = Vec::new();
    let headers = header_views(table);
    let rows = table.visible_rows();

    ui.push_id("issue_table", |ui| {
        let mut builder = TableBuilder::new(ui).striped(true).resizable(true);
        for header in &headers {
            builder = builder.column(if header.id == TITLE {
                Column::initial(260.0).at_least(120.0)
            } else {
                Column::auto().at_least(80.0)
            });
        }

        builder
            .header(112.0, |mut row| {
                for header in &headers {
                    row.col(|ui| {
                        ui.vertical(|cell| {
                            let input = inputs.entry(header.id).or_default();
                            actions.extend(render_header_cell(cell, header, input));
                        });
                    });
                }
            })
            .body(|mut body| {
                if rows.is_empty() {
                    body.row(24.0, |mut row| {
                        row.col(|ui| {
                            ui.weak("No issues found");
                        });
                    });
                    return;
                }
                for issue in &rows {
                    body.row(24.0, |mut row| {
                        for (column, header) in table.columns().iter().zip(&headers) {
                            let text = column.display(issue);
                            row.col(|ui| render_cell(ui, header.id, issue, &text));
                        }
                    });
                }
            });
    });
    actions
}

fn render_header_cell(
    ui: &mut egui::Ui,
    header: &HeaderView,
    input: &mut FilterInput,
) -> Vec<TableAction> {
    let mut actions = Vec::new();
    let indicator = match header.sorted {
        Some(true) => " ⬇",
        Some(false) => " ⬆",
        None => "",
    };
    let mut title = RichText::new(format!("{}{indicator}", header.title)).strong();
    if header.filtered {
        title = title.underline();
    }
    if header.sortable {
        let response = ui
            .add(egui::Label::new(title).sense(egui::Sense::click()))
            .on_hover_text("Sort");
        if response.clicked() {
            actions.push(TableAction::ToggleSort(header.id));
        }
    } else {
        ui.label(title);
    }

    let changed = match header.kind {
        FilterKind::None => false,
        FilterKind::Substring => substring_filter(ui, header, input),
        FilterKind::Exact => exact_filter(ui, header, input),
        FilterKind::DateInterval => date_filter(ui, header, input),
    };
    if changed {
        actions.push(TableAction::SetFilter(header.id, input.to_value(header.kind)));
    }
    actions
}

fn substring_filter(ui: &mut egui::Ui, header: &HeaderView, input: &mut FilterInput) -> bool {
    ui.horizontal(|row| {
        let mut changed = row
            .add(
                egui::TextEdit::singleline(&mut input.text)
                    .hint_text(format!("Filter {} records…", header.pre_filtered))
                    .desired_width(110.0),
            )
            .changed();
        if !input.text.is_empty() && row.small_button("x").clicked() {
            input.text.clear();
            changed = true;
        }
        changed
    })
    .inner
}

fn exact_filter(ui: &mut egui::Ui, header: &HeaderView, input: &mut FilterInput) -> bool {
    let mut selected = (!input.text.is_empty()).then(|| input.text.clone());
    let before = selected.clone();
    let label = |raw: &str| (header.formatter)(&CellValue::Text(raw.to_owned()));
    let current = selected.as_deref().map_or_else(|| "All".to_owned(), label);

    egui::ComboBox::from_id_salt(header.id)
        .width(110.0)
        .selected_text(current)
        .show_ui(ui, |combo| {
            combo.selectable_value(&mut selected, None, "All");
            for option in &header.options {
                combo.selectable_value(
                    &mut selected,
                    Some(option.clone()),
                    label(option.as_str()),
                );
            }
        });

    if selected == before {
        return false;
    }
    input.text = selected.unwrap_or_default();
    true
}

fn date_filter(ui: &mut egui::Ui, header: &HeaderView, input: &mut FilterInput) -> bool {
    let (hint_min, hint_max) = header
        .date_hint
        .map(|(min, max)| (format_date_input(min), format_date_input(max)))
        .unwrap_or_else(|| ("from".to_owned(), "to".to_owned()));

    let mut changed = false;
    for (buffer, hint) in [(&mut input.min, hint_min), (&mut input.max, hint_max)] {
        ui.horizontal(|row| {
            changed |= row
                .add(
                    egui::TextEdit::singleline(&mut *buffer)
                        .hint_text(hint)
                        .desired_width(96.0),
                )
                .changed();
            if !buffer.is_empty() && row.small_button("x").clicked() {
                buffer.clear();
                changed = true;
            }
        });
    }
    let bounded = !input.min.is_empty() || !input.max.is_empty();
    if bounded && ui.small_button("Clear filter").clicked() {
        input.min.clear();
        input.max.clear();
        changed = true;
    }
    changed
}

fn render_cell(ui: &mut egui::Ui, column: &str, issue: &IssueRecord, text: &str) {
    match column {
        columns::STATE => {
            let (fg, bg) = state_colors(issue.state);
            ui.label(RichText::new(text).color(fg).background_color(bg));
        }
        columns::SEVERITY => {
            let (fg, bg) = severity_colors(&issue.severity);
            ui.label(RichText::new(text).color(fg).background_color(bg));
        }
        columns::LINK => {
            ui.hyperlink_to("Open", &issue.web_url);
        }
        columns::IID => {
            ui.monospace(text);
        }
        columns::TITLE => {
            ui.label(text).on_hover_text(issue_details(issue));
        }
        _ => {
            ui.label(text);
        }
    }
}

fn issue_details(issue: &IssueRecord) -> String {
    let mut details = issue.description.clone();
    if !issue.labels.is_empty() {
        details.push_str(&format!("\nLabels: {}", issue.labels.join(", ")));
    }
    if let Some(milestone) = &issue.milestone {
        details.push_str(&format!("\nMilestone: {milestone}"));
    }
    if !issue.assignees.is_empty() {
        details.push_str(&format!("\nAssignees: {}", issue.assignees.join(", ")));
    }
    details.trim().to_owned()
}

fn state_colors(state: IssueState) -> (Color32, Color32) {
    match state {
        IssueState::Opened => (
            Color32::from_rgb(0x16, 0x65, 0x34),
            Color32::from_rgb(0xdc, 0xfc, 0xe7),
        ),
        IssueState::Closed => (
            Color32::from_rgb(0x1f, 0x29, 0x37),
            Color32::from_rgb(0xf3, 0xf4, 0xf6),
        ),
    }
}

fn severity_colors(severity: &Severity) -> (Color32, Color32) {
    match severity {
        Severity::Critical => (
            Color32::from_rgb(0x99, 0x1b, 0x1b),
            Color32::from_rgb(0xfe, 0xe2, 0xe2),
        ),
        Severity::High => (
            Color32::from_rgb(0x9a, 0x34, 0x12),
            Color32::from_rgb(0xff, 0xed, 0xd5),
        ),
        Severity::Medium => (
            Color32::from_rgb(0x85, 0x4d, 0x0e),
            Color32::from_rgb(0xfe, 0xf9, 0xc3),
        ),
        Severity::Low => (
            Color32::from_rgb(0x1e, 0x40, 0xaf),
            Color32::from_rgb(0xdb, 0xea, 0xfe),
        ),
        Severity::Other(_) => (
            Color32::from_rgb(0x1f, 0x29, 0x37),
            Color32::from_rgb(0xf3, 0xf4, 0xf6),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::sample_issues;

    #[test]
    fn filter_input_builds_values_per_kind() {
        let input = FilterInput {
            text: "Souza".into(),
            min: "2023-10-01".into(),
            max: String::new(),
        };
        assert_eq!(
            input.to_value(FilterKind::Substring),
            Some(FilterValue::Substring("Souza".into()))
        );
        assert_eq!(
            input.to_value(FilterKind::DateInterval),
            Some(FilterValue::DateInterval(DateInterval::parse("2023-10-01", "")))
        );
        assert_eq!(input.to_value(FilterKind::None), None);
    }

    #[test]
    fn empty_filter_input_clears_the_column() {
        let input = FilterInput::default();
        assert_eq!(input.to_value(FilterKind::Exact), None);
        assert_eq!(input.to_value(FilterKind::DateInterval), None);
    }

    #[test]
    fn header_views_carry_sort_and_options() {
        let mut table = TableEngine::new(columns::issue_columns());
        table.set_rows(sample_issues().expect("fixture"));
        table.toggle_sort(columns::SEVERITY).expect("sort");

        let views = header_views(&table);
        assert_eq!(views.len(), table.columns().len());
        let severity = views
            .iter()
            .find(|view| view.id == columns::SEVERITY)
            .expect("severity header");
        assert_eq!(severity.sorted, Some(false));
        assert_eq!(severity.options.len(), 4);
        let link = views
            .iter()
            .find(|view| view.id == columns::LINK)
            .expect("link header");
        assert!(!link.sortable);
        assert_eq!(link.kind, FilterKind::None);
    }

    #[test]
    fn issue_details_lists_supplementary_fields() {
        let issue = &sample_issues().expect("fixture")[0];
        let details = issue_details(issue);
        assert!(details.contains("Labels: bug, frontend"));
        assert!(details.contains("Milestone: Sprint 1"));
        assert!(details.contains("Assignees: Ana Costa"));
    }

    #[test]
    fn unknown_severity_uses_neutral_badge() {
        assert_eq!(
            severity_colors(&Severity::Other("blocker".into())),
            state_colors(IssueState::Closed)
        );
    }
}
