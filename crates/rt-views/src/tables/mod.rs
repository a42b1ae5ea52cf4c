//! Rocket result table view

use std::num::ParseFloatError;
use std::sync::Arc;

use ahash::AHashMap;
use egui::{pos2, vec2, Rect, RichText, ScrollArea, Ui};
use rt_core::columns::filterable;
use rt_core::{
    Choice, ColumnDescriptor, ColumnId, FilterKind, PreferenceStore, RequestId, SortDirection,
    SortState, TableConfig, TableStatus, COLUMNS,
};
use rt_data::{DataError, TableEvent, TableInstance};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Configuration for rocket table views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub show_row_numbers: bool,
    pub striped_rows: bool,
    pub show_filters: bool,
    pub column_width: f32,
    pub table: TableConfig,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            show_row_numbers: true,
            striped_rows: true,
            show_filters: true,
            column_width: 96.0,
            table: TableConfig::default(),
        }
    }
}

const ROW_NUMBER_WIDTH: f32 = 48.0;

/// Text typed into the min/max boxes of one range column
#[derive(Debug, Clone, Default)]
struct RangeInput {
    min: String,
    max: String,
    invalid: bool,
}

/// Table of rocket configurations with filters, sorting and a virtualized body
pub struct RocketTableView {
    title: String,
    pub config: ViewConfig,
    table: TableInstance,

    range_inputs: AHashMap<ColumnId, RangeInput>,
    /// Last decode failure, shown until the next successful decode
    notice: Option<String>,
    scroll_to_top: bool,
}

impl RocketTableView {
    /// Create a view whose decode worker runs on `runtime` and requests a
    /// repaint of `ctx` whenever a response is ready
    pub fn new(
        ctx: &egui::Context,
        runtime: &Handle,
        title: impl Into<String>,
        config: ViewConfig,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        let repaint = ctx.clone();
        let table = TableInstance::with_notifier(
            runtime,
            config.table.clone(),
            preferences,
            Some(Arc::new(move || repaint.request_repaint())),
        );

        // Restored bounds show up in the inputs
        let range_inputs = filterable(FilterKind::Range)
            .filter_map(|column| {
                let bounds = table.filters().range(column.id);
                if bounds.is_unbounded() {
                    return None;
                }
                let input = RangeInput {
                    min: format_bound(bounds.min),
                    max: format_bound(bounds.max),
                    invalid: false,
                };
                Some((column.id, input))
            })
            .collect();

        Self {
            title: title.into(),
            config,
            table,
            range_inputs,
            notice: None,
            scroll_to_top: false,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.title
    }

    /// Hand a new JSON payload to the table. Current rows stay visible until
    /// it is decoded.
    pub fn submit(&mut self, payload: impl Into<String>) -> Result<RequestId, DataError> {
        self.table.submit(payload)
    }

    pub fn table(&self) -> &TableInstance {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut TableInstance {
        &mut self.table
    }

    /// Tear the view down; see [`TableInstance::shutdown`]
    pub fn shutdown(self) -> Option<JoinHandle<()>> {
        self.table.shutdown()
    }

    pub fn ui(&mut self, ui: &mut Ui) {
        for event in self.table.poll() {
            match event {
                TableEvent::Applied { .. } => self.notice = None,
                TableEvent::Failed { request, error } => {
                    self.notice = Some(format!("Request {} failed: {}", request, error));
                }
                TableEvent::Superseded { .. } => {}
            }
        }

        self.status_line(ui);
        ui.add_space(4.0);

        if self.config.show_filters {
            ui.collapsing("Filters", |ui| self.filter_panel(ui));
            ui.add_space(4.0);
        }

        let table_width = self.table_width();
        ScrollArea::horizontal()
            .id_source(("rocket_table_h", &self.title))
            .show(ui, |ui| {
                ui.set_min_width(table_width);
                self.header(ui);
                ui.separator();
                self.body(ui, table_width);
            });
    }

    fn status_line(&self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            let status = self.table.status();
            let label = RichText::new(status.label());
            match status {
                TableStatus::Error { .. } => ui.label(label.color(ui.visuals().error_fg_color)),
                TableStatus::Decoding { .. } => {
                    ui.spinner();
                    ui.label(label)
                }
                _ => ui.label(label),
            };
            ui.separator();
            ui.label(format!(
                "Rows: {} of {}",
                self.table.visible_count(),
                self.table.total_count()
            ));
            if self.table.dropped_count() > 0 {
                ui.separator();
                ui.label(format!("Dropped: {}", self.table.dropped_count()))
                    .on_hover_text("Records missing a required field or carrying the wrong type");
            }
            if let Some(notice) = &self.notice {
                ui.separator();
                ui.label(RichText::new(notice).color(ui.visuals().warn_fg_color));
            }
        });
    }

    fn filter_panel(&mut self, ui: &mut Ui) {
        egui::Grid::new(("rocket_table_filters", &self.title))
            .num_columns(2)
            .spacing([12.0, 4.0])
            .show(ui, |ui| {
                for column in filterable(FilterKind::Equality) {
                    ui.label(column.header);
                    self.equality_filter(ui, column);
                    ui.end_row();
                }
                for column in filterable(FilterKind::Range) {
                    ui.label(column.header);
                    self.range_filter(ui, column);
                    ui.end_row();
                }
            });

        if ui.button("Reset filters").clicked() {
            self.table.reset_all();
            self.range_inputs.clear();
            self.scroll_to_top = true;
        }
    }

    fn equality_filter(&mut self, ui: &mut Ui, column: &ColumnDescriptor) {
        let current = self.table.filters().choice(column.id);
        let mut selected = current.clone();

        egui::ComboBox::from_id_source(("rocket_table_eq", column.id))
            .selected_text(choice_label(&current))
            .width(160.0)
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut selected, Choice::All, "All");
                for value in self.table.option_domain(column.id) {
                    let option = Choice::Only(value.clone());
                    ui.selectable_value(&mut selected, option, value.to_string());
                }
            });

        if selected != current {
            if let Err(e) = self.table.set_equality(column.id, selected) {
                tracing::warn!("Could not filter {}: {}", column.header, e);
            }
        }
    }

    fn range_filter(&mut self, ui: &mut Ui, column: &ColumnDescriptor) {
        let input = self.range_inputs.entry(column.id).or_default();
        let error_color = ui.visuals().error_fg_color;
        let mut changed = false;

        ui.horizontal(|ui| {
            let edit = |ui: &mut Ui, text: &mut String, hint: &str, invalid: bool| {
                let mut widget = egui::TextEdit::singleline(text)
                    .hint_text(hint)
                    .desired_width(72.0);
                if invalid {
                    widget = widget.text_color(error_color);
                }
                ui.add(widget).changed()
            };
            changed |= edit(ui, &mut input.min, "min", input.invalid);
            ui.label("to");
            changed |= edit(ui, &mut input.max, "max", input.invalid);
        });

        if changed {
            self.apply_range(column);
        }
    }

    fn apply_range(&mut self, column: &ColumnDescriptor) {
        let Some(input) = self.range_inputs.get_mut(&column.id) else {
            return;
        };
        let (min, max) = match (parse_bound(&input.min), parse_bound(&input.max)) {
            (Ok(min), Ok(max)) => (min, max),
            // Keep the last valid filter while the user is typing
            _ => {
                input.invalid = true;
                return;
            }
        };

        input.invalid = false;
        if let Err(e) = self.table.set_range(column.id, min, max) {
            tracing::warn!("Could not filter {}: {}", column.header, e);
            if let Some(input) = self.range_inputs.get_mut(&column.id) {
                input.invalid = true;
            }
        }
    }

    fn header(&mut self, ui: &mut Ui) {
        let height = self.table.viewport().row_extent() as f32;
        let mut clicked = None;

        ui.horizontal(|ui| {
            if self.config.show_row_numbers {
                let label = egui::Label::new(RichText::new("#").strong());
                ui.add_sized([ROW_NUMBER_WIDTH, height], label);
            }
            for column in COLUMNS {
                let text = header_label(column, self.table.sort());
                let button = egui::Button::new(RichText::new(text).strong()).frame(false);
                let response = ui.add_sized([self.config.column_width, height], button);
                if response.clicked() && column.is_sortable() {
                    let multi = ui.input(|i| i.modifiers.shift);
                    clicked = Some((column.id, multi));
                }
            }
        });

        if let Some((column, multi)) = clicked {
            self.table.toggle_sort(column, multi);
        }
    }

    fn body(&mut self, ui: &mut Ui, table_width: f32) {
        let row_height = self.table.viewport().row_extent() as f32;
        let total_height = self.table.total_extent() as f32;

        let mut area = ScrollArea::vertical()
            .id_source(("rocket_table_body", &self.title))
            .auto_shrink([true, false]);
        if std::mem::take(&mut self.scroll_to_top) {
            area = area.vertical_scroll_offset(0.0);
        }

        area.show_viewport(ui, |ui, viewport| {
            ui.set_height(total_height);
            ui.set_min_width(table_width);

            self.table.set_container_extent(viewport.height() as f64);
            self.table.scroll_to(viewport.min.y as f64);

            let origin = ui.max_rect().min;
            let faint = ui.visuals().faint_bg_color;
            let Some(range) = self.table.visible_range() else {
                return;
            };

            for position in range {
                let Some(row) = self.table.row_at(position) else {
                    continue;
                };
                let rect = Rect::from_min_size(
                    pos2(origin.x, origin.y + position as f32 * row_height),
                    vec2(table_width, row_height),
                );
                if self.config.striped_rows && position % 2 == 1 {
                    ui.painter().rect_filled(rect, 0.0, faint);
                }

                ui.allocate_ui_at_rect(rect, |ui| {
                    ui.horizontal(|ui| {
                        if self.config.show_row_numbers {
                            ui.add_sized(
                                [ROW_NUMBER_WIDTH, row_height],
                                egui::Label::new((position + 1).to_string()),
                            );
                        }
                        for column in COLUMNS {
                            let text = column.accessor(row).to_string();
                            ui.add_sized(
                                [self.config.column_width, row_height],
                                egui::Label::new(text).truncate(true),
                            );
                        }
                    });
                });
            }
        });
    }

    fn table_width(&self) -> f32 {
        let spacing = 8.0;
        let numbers = if self.config.show_row_numbers { ROW_NUMBER_WIDTH + spacing } else { 0.0 };
        numbers + COLUMNS.len() as f32 * (self.config.column_width + spacing)
    }

    pub fn save_config(&self) -> Value {
        json!({
            "show_row_numbers": self.config.show_row_numbers,
            "striped_rows": self.config.striped_rows,
            "show_filters": self.config.show_filters,
            "column_width": self.config.column_width,
            "row_extent": self.table.viewport().row_extent(),
        })
    }

    pub fn load_config(&mut self, config: Value) {
        if let Some(show_row_numbers) = config.get("show_row_numbers").and_then(|v| v.as_bool()) {
            self.config.show_row_numbers = show_row_numbers;
        }
        if let Some(striped) = config.get("striped_rows").and_then(|v| v.as_bool()) {
            self.config.striped_rows = striped;
        }
        if let Some(show_filters) = config.get("show_filters").and_then(|v| v.as_bool()) {
            self.config.show_filters = show_filters;
        }
        if let Some(width) = config.get("column_width").and_then(|v| v.as_f64()) {
            self.config.column_width = width as f32;
        }
        if let Some(row_extent) = config.get("row_extent").and_then(|v| v.as_f64()) {
            self.config.table.row_extent = row_extent;
            self.table.set_row_extent(row_extent);
        }
    }
}

/// Empty text is an absent bound
fn parse_bound(text: &str) -> Result<Option<f64>, ParseFloatError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<f64>().map(Some)
}

fn format_bound(bound: Option<f64>) -> String {
    bound.map(|v| v.to_string()).unwrap_or_default()
}

fn choice_label(choice: &Choice) -> String {
    match choice {
        Choice::All => "All".to_string(),
        Choice::Only(value) => value.to_string(),
    }
}

/// Header text with the sort arrow, plus the tier number when several keys
/// are active
fn header_label(column: &ColumnDescriptor, sort: &SortState) -> String {
    let Some(direction) = sort.direction_of(column.id) else {
        return column.header.to_string();
    };
    let arrow = match direction {
        SortDirection::Ascending => "⬆",
        SortDirection::Descending => "⬇",
    };
    match sort.priority_of(column.id) {
        Some(priority) if sort.keys().len() > 1 => {
            format!("{} {}{}", column.header, arrow, priority + 1)
        }
        _ => format!("{} {}", column.header, arrow),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rt_core::columns::descriptor;
    use rt_core::{MemoryPreferenceStore, SortKey};

    #[test]
    fn test_parse_bound() {
        assert_eq!(parse_bound(""), Ok(None));
        assert_eq!(parse_bound("  "), Ok(None));
        assert_eq!(parse_bound(" 2.5 "), Ok(Some(2.5)));
        assert!(parse_bound("2.5t").is_err());
    }

    #[test]
    fn test_header_label_shows_tiers() {
        let wet_mass = descriptor(ColumnId::WetMass);
        let twr = descriptor(ColumnId::Twr);

        let single = SortState::new(vec![SortKey::desc(ColumnId::WetMass)]);
        assert_eq!(header_label(wet_mass, &single), format!("{} ⬇", wet_mass.header));
        assert_eq!(header_label(twr, &single), twr.header);

        let multi = SortState::new(vec![SortKey::desc(ColumnId::WetMass), SortKey::asc(ColumnId::Twr)]);
        assert_eq!(header_label(twr, &multi), format!("{} ⬆2", twr.header));
    }

    #[tokio::test]
    async fn test_config_round_trip() {
        let store = Arc::new(MemoryPreferenceStore::with_values([("rocketTable.twr.min", "1.25")]));
        let ctx = egui::Context::default();
        let mut view = RocketTableView::new(&ctx, &Handle::current(), "Rockets", ViewConfig::default(), store);
        assert_eq!(view.range_inputs.get(&ColumnId::Twr).map(|i| i.min.as_str()), Some("1.25"));

        view.load_config(json!({ "striped_rows": false, "column_width": 120.0, "row_extent": 32.0 }));
        let saved = view.save_config();

        assert_eq!(saved["striped_rows"], json!(false));
        assert_eq!(saved["column_width"], json!(120.0));
        assert_eq!(view.table().viewport().row_extent(), 32.0);
        assert!(view.config.show_row_numbers);
    }
}
