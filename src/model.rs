use arboard::Clipboard;
use tracing::{debug, info, trace, warn};

use sift::access::is_allowed;
use sift::column::ColumnFilterConfig;
use sift::domain::{CMDMode, Message, SiftConfig, SiftError, help_text};
use sift::editor::{FilterEditor, PointerCapture};
use sift::engine::rows_for;
use sift::loader::export_json;
use sift::record::Record;
use sift::state::{SortDirection, TableState};

use crate::inputter::{InputResult, Inputter};
use crate::ui::{COLUMN_WIDTH_MARGIN, CMDLINE_HEIGH, SCROLLBAR_WIDTH, TABLE_HEADER_HEIGHT, editor_region};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    RECORD,
    POPUP,
    CMDINPUT,
}

#[derive(Debug, Clone, Default)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

struct RecordView {
    record_idx: usize, // Index into Model.rows
    lines: Vec<(String, String)>,
    curser_row: usize,
    curser_offset: usize,
}

impl RecordView {
    fn empty() -> Self {
        RecordView {
            record_idx: 0,
            lines: Vec::new(),
            curser_row: 0,
            curser_offset: 0,
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(SCROLLBAR_WIDTH),
            table_height: ui_height.saturating_sub(CMDLINE_HEIGH + TABLE_HEADER_HEIGHT),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

/// Everything the ui needs for one frame.
pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub nrows: usize,
    pub total_rows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub layout: UILayout,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub sort_label: String,
    pub nfilters: usize,
    pub global_search: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            table: Vec::new(),
            nrows: 0,
            total_rows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            show_popup: false,
            popup_message: String::new(),
            layout: UILayout::default(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            sort_label: String::new(),
            nfilters: 0,
            global_search: String::new(),
        }
    }
}

pub struct Model {
    config: SiftConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    name: String,
    records: Vec<Record>,
    columns: Vec<ColumnFilterConfig>,
    column_widths: Vec<usize>,
    state: TableState,
    rows: Vec<usize>, // Mapping of view row index to record index
    visible_columns: Vec<usize>,
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    offset_column: usize,
    record_view: RecordView,
    editor: FilterEditor<Box<dyn PointerCapture>>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    clipboard: Option<Clipboard>,
    uilayout: UILayout,
    uidata: UIData,
    status_message: String,
}

impl Model {
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        config: &SiftConfig,
        name: String,
        records: Vec<Record>,
        columns: Vec<ColumnFilterConfig>,
        state: TableState,
        capture: Box<dyn PointerCapture>,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        let clipboard = match Clipboard::new() {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("Clipboard not available: {e:?}");
                None
            }
        };
        let column_widths = columns
            .iter()
            .map(|c| Self::calculate_column_width(c, &records, config.max_column_width))
            .collect();

        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            name,
            records,
            columns,
            column_widths,
            state,
            rows: Vec::new(),
            visible_columns: Vec::new(),
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            offset_column: 0,
            record_view: RecordView::empty(),
            editor: FilterEditor::new(capture),
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            clipboard,
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            status_message: "Started sift!".to_string(),
        };
        model.refresh_rows();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn table_state(&self) -> &TableState {
        &self.state
    }

    pub fn editor_active(&self) -> Option<&str> {
        self.editor.active()
    }

    pub fn quit(&mut self) {
        self.editor.close();
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), SiftError> {
        let Some(msg) = message else {
            return Ok(());
        };

        if !is_allowed(self.config.role, msg.required()) {
            self.set_status_message(format!(
                "{msg:?} is not permitted for role {}",
                self.config.role
            ));
            self.update_uidata();
            return Ok(());
        }

        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::MoveDown => self.move_table_selection_down(1),
                Message::MoveUp => self.move_table_selection_up(1),
                Message::MoveLeft => self.move_table_selection_left(),
                Message::MoveRight => self.move_table_selection_right(),
                Message::MovePageUp => self.move_table_selection_up(self.uilayout.table_height),
                Message::MovePageDown => {
                    self.move_table_selection_down(self.uilayout.table_height)
                }
                Message::MoveBeginning => self.move_table_selection_beginning(),
                Message::MoveEnd => self.move_table_selection_end(),
                Message::CycleSort => self.cycle_sort(),
                Message::EditFilter => {
                    if let Some(key) = self.current_column_key() {
                        self.enter_cmd_mode(CMDMode::ColumnFilter(key));
                    }
                }
                Message::EditSearch => self.enter_cmd_mode(CMDMode::GlobalSearch),
                Message::ClearFilter => self.clear_filter(),
                Message::ClearAll => self.clear_all(),
                Message::CopyCell => self.copy_table_cell(),
                Message::CopyRecord => self.copy_record(),
                Message::Export => self.export_view(),
                Message::Enter => self.enter(),
                Message::Help => self.show_help(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Modus::RECORD => match msg {
                Message::Quit => self.quit(),
                Message::MoveDown => self.move_record_selection_down(1),
                Message::MoveUp => self.move_record_selection_up(1),
                Message::MoveLeft => self.previous_record(),
                Message::MoveRight => self.next_record(),
                Message::MovePageUp => self.move_record_selection_up(self.uilayout.table_height),
                Message::MovePageDown => {
                    self.move_record_selection_down(self.uilayout.table_height)
                }
                Message::CopyRecord => self.copy_record(),
                Message::Help => self.show_help(),
                Message::Exit => self.exit(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Help | Message::Enter => self.exit(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Modus::CMDINPUT => match msg {
                Message::RawKey(key) => {
                    self.last_input = self.input.read(key);
                    if self.last_input.finished {
                        self.handle_cmd_input();
                    }
                }
                Message::PointerDown(column, row) => {
                    if self.editor.pointer_down(column, row) {
                        debug!("Filter editor dismissed by pointer at {column}:{row}");
                        self.leave_cmd_mode();
                    }
                }
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
        }

        self.update_uidata();
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn current_column_idx(&self) -> Option<usize> {
        self.visible_columns.get(self.curser_column).copied()
    }

    fn current_column_key(&self) -> Option<String> {
        self.current_column_idx().map(|idx| self.columns[idx].key.clone())
    }

    fn current_record(&self) -> Option<&Record> {
        self.rows
            .get(self.offset_row + self.curser_row)
            .map(|&idx| &self.records[idx])
    }

    fn cycle_sort(&mut self) {
        if let Some(key) = self.current_column_key() {
            self.state.cycle_sort(&key);
            self.set_status_message(format!("Sort: {}", self.state.sort()));
            self.refresh_rows();
            self.persist_state();
        }
    }

    fn clear_filter(&mut self) {
        if let Some(key) = self.current_column_key() {
            self.state.clear_filter(&key);
            self.set_status_message(format!("Cleared filter on {key}"));
            self.refresh_rows();
            self.persist_state();
        }
    }

    fn clear_all(&mut self) {
        self.state.clear_all();
        self.set_status_message("Cleared all filters");
        self.refresh_rows();
        self.persist_state();
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        let (id, current) = match &mode {
            CMDMode::ColumnFilter(key) => (
                format!("column:{key}"),
                self.state.filters().get(key).unwrap_or_default().to_string(),
            ),
            CMDMode::GlobalSearch => ("search".to_string(), self.state.global_search().to_string()),
        };

        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);

        self.editor.open(id);
        self.editor.register_region(editor_region(&self.uilayout));

        self.input.clear();
        self.input.set(&current);
        self.last_input = self.input.get();
    }

    fn leave_cmd_mode(&mut self) {
        self.editor.close();
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        self.cmd_mode = None;
        self.input.clear();
        self.last_input = self.input.get();
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {:?}", self.last_input);
        let canceled = self.last_input.canceled;
        let value = self.last_input.input.clone();
        let mode = self.cmd_mode.clone();
        self.leave_cmd_mode();
        if canceled {
            return;
        }

        match mode {
            Some(CMDMode::ColumnFilter(key)) => {
                self.state.set_filter(&key, &value);
                if value.is_empty() {
                    self.set_status_message(format!("Cleared filter on {key}"));
                } else {
                    self.set_status_message(format!("Filter {key} = {value}"));
                }
            }
            Some(CMDMode::GlobalSearch) => {
                self.state.set_global_search(&value);
                self.set_status_message(format!("Search: {value}"));
            }
            None => {
                info!("Cmd mode is none!");
                return;
            }
        }
        self.curser_row = 0;
        self.offset_row = 0;
        self.refresh_rows();
        self.persist_state();
    }

    fn persist_state(&mut self) {
        let Some(path) = self.config.state_file.clone() else {
            return;
        };
        match serde_json::to_string_pretty(self.state.view()) {
            Ok(text) => {
                if let Err(e) = std::fs::write(&path, text) {
                    warn!("Could not write state to {}: {e}", path.display());
                }
            }
            Err(e) => warn!("Could not serialize state: {e}"),
        }
    }

    fn enter(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let record_idx = self.offset_row + self.curser_row;
        self.build_record_view(record_idx);
        self.previous_modus = Modus::TABLE;
        self.modus = Modus::RECORD;
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE | Modus::CMDINPUT => {}
            Modus::RECORD => {
                self.previous_modus = Modus::RECORD;
                self.modus = Modus::TABLE;
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
            }
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn export_view(&mut self) {
        let view: Vec<&Record> = self.rows.iter().map(|&idx| &self.records[idx]).collect();
        let count = view.len();
        let path = self.config.export_dir.join(format!(
            "sift-export-{}.json",
            chrono::Local::now().format("%Y%m%d-%H%M%S")
        ));
        match export_json(&path, &view) {
            Ok(_) => {
                self.set_status_message(format!("Exported {count} records to {}", path.display()))
            }
            Err(e) => {
                warn!("Error exporting to {}: {e}", path.display());
                self.set_status_message(format!("Export failed: {e}"));
            }
        }
    }

    fn copy_to_clipboard(&mut self, content: String) {
        let Some(clipboard) = self.clipboard.as_mut() else {
            self.set_status_message("Clipboard not available");
            return;
        };
        match clipboard.set_text(content) {
            Ok(_) => self.set_status_message("Copied to clipboard."),
            Err(e) => {
                warn!("Error copying to clipboard: {e:?}");
                self.set_status_message("Copy failed");
            }
        }
    }

    fn copy_table_cell(&mut self) {
        let cell = match (self.current_record(), self.current_column_idx()) {
            (Some(record), Some(cidx)) => record.text(&self.columns[cidx].key),
            _ => return,
        };
        trace!("Cell content: {}", cell);
        self.copy_to_clipboard(cell);
    }

    fn copy_record(&mut self) {
        let record = match self.modus {
            Modus::RECORD => self.rows.get(self.record_view.record_idx).map(|&i| &self.records[i]),
            _ => self.current_record(),
        };
        let Some(json) = record.and_then(|r| r.to_json().ok()) else {
            return;
        };
        self.copy_to_clipboard(json);
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.editor.register_region(editor_region(&self.uilayout));
        self.clamp_cursor();
        self.update_table_data();
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    // -------------------- View building ---------------------- //

    /// Re-run the engine against the current state.
    fn refresh_rows(&mut self) {
        self.rows = rows_for(
            &self.records,
            &self.columns,
            self.state.view(),
            &self.config.global_search_fields,
        );
        self.clamp_cursor();
        self.update_table_data();
    }

    fn clamp_cursor(&mut self) {
        let nrows = self.rows.len();
        let height = self.uilayout.table_height.max(1);
        if nrows == 0 {
            self.offset_row = 0;
            self.curser_row = 0;
            return;
        }
        if self.offset_row + self.curser_row >= nrows {
            self.offset_row = nrows.saturating_sub(height);
            self.curser_row = nrows - 1 - self.offset_row;
        }
        if self.curser_row >= height {
            self.offset_row += self.curser_row + 1 - height;
            self.curser_row = height - 1;
        }
    }

    fn calculate_column_width(
        column: &ColumnFilterConfig,
        records: &[Record],
        max_column_width: usize,
    ) -> usize {
        let widest = records
            .iter()
            .map(|r| r.text(&column.key).chars().count())
            .max()
            .unwrap_or(0);
        // Room for the sort and filter markers
        let header = column.title().chars().count() + 2;
        std::cmp::min(std::cmp::max(widest, header), max_column_width) + COLUMN_WIDTH_MARGIN
    }

    fn header_name(&self, cidx: usize) -> String {
        let column = &self.columns[cidx];
        let mut name = column.title().to_string();
        match self.state.sort().direction_for(&column.key) {
            SortDirection::Ascending => name.push('▲'),
            SortDirection::Descending => name.push('▼'),
            SortDirection::None => {}
        }
        if self.state.filters().contains(&column.key) {
            name.push('*');
        }
        name
    }

    fn update_table_data(&mut self) {
        self.visible_columns.clear();
        let mut visible_width = 0;
        for (cidx, width) in self.column_widths.iter().enumerate().skip(self.offset_column) {
            if visible_width + width > self.uilayout.table_width && !self.visible_columns.is_empty() {
                break;
            }
            self.visible_columns.push(cidx);
            visible_width += width;
        }
        self.curser_column = std::cmp::min(
            self.curser_column,
            self.visible_columns.len().saturating_sub(1),
        );
        self.update_uidata();
    }

    fn build_table_views(&self) -> Vec<ColumnView> {
        let rbegin = self.offset_row;
        let rend = std::cmp::min(rbegin + self.uilayout.table_height, self.rows.len());
        self.visible_columns
            .iter()
            .map(|&cidx| {
                let key = &self.columns[cidx].key;
                ColumnView {
                    name: self.header_name(cidx),
                    width: self.column_widths[cidx],
                    data: self.rows[rbegin..rend]
                        .iter()
                        .map(|&ridx| {
                            self.records[ridx]
                                .text(key)
                                .replace("\r\n", " ↵ ")
                                .replace('\n', " ↵ ")
                        })
                        .collect(),
                }
            })
            .collect()
    }

    fn build_record_view(&mut self, record_idx: usize) {
        trace!("Building record view ...");
        let record = &self.records[self.rows[record_idx]];
        self.record_view = RecordView {
            record_idx,
            lines: record.flatten(),
            curser_row: 0,
            curser_offset: 0,
        };
    }

    fn build_record_views(&self) -> Vec<ColumnView> {
        let record = &self.record_view;
        let rbegin = record.curser_offset;
        let rend = std::cmp::min(rbegin + self.uilayout.table_height, record.lines.len());
        let lines = &record.lines[rbegin..rend];
        let header_width = record
            .lines
            .iter()
            .map(|(k, _)| k.chars().count())
            .max()
            .unwrap_or(0)
            + COLUMN_WIDTH_MARGIN;
        vec![
            ColumnView {
                name: "Field".to_string(),
                width: header_width,
                data: lines.iter().map(|(k, _)| k.clone()).collect(),
            },
            ColumnView {
                name: "Value".to_string(),
                width: self.uilayout.table_width.saturating_sub(header_width),
                data: lines.iter().map(|(_, v)| v.clone()).collect(),
            },
        ]
    }

    fn update_uidata(&mut self) {
        let (name, table, nrows, selected_row, selected_column, abs_selected_row) = match self.modus {
            Modus::RECORD => (
                format!("R[{}] {}/{}", self.name, self.record_view.record_idx + 1, self.rows.len()),
                self.build_record_views(),
                self.record_view.lines.len(),
                self.record_view.curser_row,
                1,
                self.record_view.curser_offset + self.record_view.curser_row,
            ),
            Modus::POPUP | Modus::CMDINPUT if self.previous_modus == Modus::RECORD => (
                format!("R[{}]", self.name),
                self.build_record_views(),
                self.record_view.lines.len(),
                self.record_view.curser_row,
                1,
                self.record_view.curser_offset + self.record_view.curser_row,
            ),
            _ => (
                self.name.clone(),
                self.build_table_views(),
                self.rows.len(),
                self.curser_row,
                self.curser_column,
                self.offset_row + self.curser_row,
            ),
        };

        self.uidata = UIData {
            name,
            table,
            nrows,
            total_rows: self.records.len(),
            selected_row,
            selected_column,
            abs_selected_row,
            show_popup: self.modus == Modus::POPUP,
            popup_message: help_text(self.config.role),
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode.clone(),
            active_cmdinput: self.modus == Modus::CMDINPUT,
            status_message: self.status_message.clone(),
            sort_label: self.state.sort().to_string(),
            nfilters: self.state.filters().len(),
            global_search: self.state.global_search().to_string(),
        };
    }

    // -------------------- Cursor movement ---------------------- //

    fn move_table_selection_beginning(&mut self) {
        self.curser_row = 0;
        self.offset_row = 0;
        self.update_table_data();
    }

    fn move_table_selection_end(&mut self) {
        let nrows = self.rows.len();
        if nrows == 0 {
            return;
        }
        let height = self.uilayout.table_height.max(1);
        if nrows < height {
            self.offset_row = 0;
            self.curser_row = nrows - 1;
        } else {
            self.offset_row = nrows - height;
            self.curser_row = height - 1;
        }
        self.update_table_data();
    }

    fn move_table_selection_up(&mut self, size: usize) {
        if self.curser_row > 0 {
            self.curser_row = self.curser_row.saturating_sub(size);
        } else {
            self.offset_row = self.offset_row.saturating_sub(size);
        }
        self.update_table_data();
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let nrows = self.rows.len();
        let height = self.uilayout.table_height.max(1);
        let current = self.offset_row + self.curser_row;
        if current + 1 >= nrows {
            return;
        }
        let target = std::cmp::min(current + size, nrows - 1);
        if target < self.offset_row + height {
            self.curser_row = target - self.offset_row;
        } else {
            self.offset_row = target + 1 - height;
            self.curser_row = height - 1;
        }
        self.update_table_data();
    }

    fn move_table_selection_left(&mut self) {
        if self.curser_column > 0 {
            self.curser_column -= 1;
        } else if self.offset_column > 0 {
            self.offset_column -= 1;
        }
        self.update_table_data();
    }

    fn move_table_selection_right(&mut self) {
        let Some(&current) = self.visible_columns.get(self.curser_column) else {
            return;
        };
        if current + 1 >= self.columns.len() {
            return;
        }
        if self.curser_column + 1 < self.visible_columns.len() {
            self.curser_column += 1;
        } else {
            // At the end of the screen
            self.offset_column += 1;
        }
        self.update_table_data();
    }

    fn move_record_selection_up(&mut self, size: usize) {
        let record = &mut self.record_view;
        if record.curser_row > 0 {
            record.curser_row = record.curser_row.saturating_sub(size);
        } else {
            record.curser_offset = record.curser_offset.saturating_sub(size);
        }
    }

    fn move_record_selection_down(&mut self, size: usize) {
        let height = self.uilayout.table_height.max(1);
        let record = &mut self.record_view;
        let nlines = record.lines.len();
        let current = record.curser_offset + record.curser_row;
        if current + 1 >= nlines {
            return;
        }
        let target = std::cmp::min(current + size, nlines - 1);
        if target < record.curser_offset + height {
            record.curser_row = target - record.curser_offset;
        } else {
            record.curser_offset = target + 1 - height;
            record.curser_row = height - 1;
        }
    }

    fn previous_record(&mut self) {
        if self.record_view.record_idx > 0 {
            self.build_record_view(self.record_view.record_idx - 1);
        }
    }

    fn next_record(&mut self) {
        if self.record_view.record_idx + 1 < self.rows.len() {
            self.build_record_view(self.record_view.record_idx + 1);
        }
    }
}
