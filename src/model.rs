use arboard::Clipboard;
use ratatui::crossterm::event::{KeyCode, KeyEvent};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use contact_tv::domain::{CMDMode, HELP_TEXT, Message};
use contact_tv::export;
use contact_tv::filter::parse_filter_input;
use contact_tv::{ContactRow, DialogClose, ListError, RouteSynchronizer};

use crate::inputter::{InputResult, Inputter};

const DEFAULT_EXPORT_PATH: &str = "contacts.csv";

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    LOADING,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
    CONFIRM,
}

/// Everything the ui needs for one frame.
pub struct UIData {
    pub title: String,
    pub page_info: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub loading: bool,
    pub status_message: String,
}

pub struct Model {
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    sync: RouteSynchronizer,
    curser_row: usize,
    curser_column: usize,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    popup_message: String,
    pending_delete: Option<i64>,
    status_message: String,
}

impl Model {
    pub fn init(sync: RouteSynchronizer, clipboard: Option<Clipboard>) -> Self {
        Self {
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            sync,
            curser_row: 0,
            curser_column: 0,
            clipboard,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            popup_message: String::new(),
            pending_delete: None,
            status_message: "Started ctv!".to_string(),
        }
    }

    #[cfg(test)]
    pub fn sync(&self) -> &RouteSynchronizer {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut RouteSynchronizer {
        &mut self.sync
    }

    /// Wait up to `timeout` for synchronizer events and apply them to the view.
    pub async fn pump(&mut self, timeout: Duration) {
        self.sync.pump(timeout).await;
        self.after_sync();
    }

    #[cfg(test)]
    pub async fn settle(&mut self) {
        self.sync.settle().await;
        self.after_sync();
    }

    fn after_sync(&mut self) {
        if let Some(e) = self.sync.take_error() {
            self.set_status_message(e.user_message());
        }
        if self.status != Status::QUITTING {
            self.status = if self.sync.is_loading() {
                Status::LOADING
            } else {
                Status::READY
            };
        }
        self.clamp_curser();
    }

    pub fn raw_keyevents(&self) -> bool {
        matches!(self.modus, Modus::CMDINPUT | Modus::CONFIRM)
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        trace!("Status: {}", self.status_message);
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), ListError> {
        let Some(msg) = message else {
            return Ok(());
        };
        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.curser_row = self.curser_row.saturating_sub(1),
                Message::MoveDown => {
                    self.curser_row += 1;
                    self.clamp_curser();
                }
                Message::MoveLeft => self.curser_column = self.curser_column.saturating_sub(1),
                Message::MoveRight => {
                    self.curser_column += 1;
                    self.clamp_curser();
                }
                Message::NextPage => self.next_server_page(),
                Message::PrevPage => self.previous_server_page(),
                Message::NextLocalPage => {
                    if self.sync.table_mut().next_page() {
                        self.curser_row = 0;
                    }
                }
                Message::PrevLocalPage => {
                    if self.sync.table_mut().previous_page() {
                        self.curser_row = 0;
                    }
                }
                Message::FirstLocalPage => {
                    self.sync.table_mut().first_page();
                    self.curser_row = 0;
                }
                Message::LastLocalPage => {
                    self.sync.table_mut().last_page();
                    self.curser_row = 0;
                }
                Message::ToggleServerSort => self.toggle_server_sort(),
                Message::SortAscending => self.sort_current_column(true),
                Message::SortDescending => self.sort_current_column(false),
                Message::Search => {
                    let current = self.sync.table().filter().to_string();
                    self.enter_cmd_mode(CMDMode::FreeText, &current);
                }
                Message::Filter => self.enter_cmd_mode(CMDMode::AddFilter, ""),
                Message::Export => self.enter_cmd_mode(CMDMode::Export, DEFAULT_EXPORT_PATH),
                Message::ClearFilters => self.clear_filters(),
                Message::Delete => self.ask_delete(),
                Message::Reload => {
                    self.sync.reload();
                    self.set_status_message("Reloading ...");
                }
                Message::Back => {
                    if !self.sync.go_back() {
                        self.set_status_message("No previous query");
                    }
                }
                Message::CopyRow => self.copy_table_row(),
                Message::Help => self.show_help(),
                Message::Exit => self.clear_local_view(),
                Message::Resize(width, height) => trace!("UI was resized to w:{width}, h:{height}"),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter | Message::Help => self.close_popup(),
                _ => (),
            },
            Modus::CONFIRM => {
                if let Message::RawKey(key) = msg {
                    self.confirm_input(key)
                }
            }
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key)
                }
            }
        }
        self.after_sync();
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn next_server_page(&mut self) {
        let page = self.sync.state().page;
        if u64::from(page) < self.sync.total_pages() {
            self.sync.navigate_to_page(page + 1);
        } else {
            self.set_status_message("Already on the last page");
        }
    }

    fn previous_server_page(&mut self) {
        let page = self.sync.state().page;
        if page > 1 {
            self.sync.navigate_to_page(page - 1);
        } else {
            self.set_status_message("Already on the first page");
        }
    }

    fn toggle_server_sort(&mut self) {
        let Some(&column) = self.sync.table().columns().get(self.curser_column) else {
            return;
        };
        if column.is_sortable() {
            self.sync.sort_by(column.name());
        } else {
            self.set_status_message(format!("Column {} cannot be sorted", column.name()));
        }
    }

    fn sort_current_column(&mut self, ascending: bool) {
        let Some(&column) = self.sync.table().columns().get(self.curser_column) else {
            return;
        };
        let start_time = Instant::now();
        self.sync.table_mut().sort_by(column, ascending);
        debug!(
            "Sorting page on {} took {}ms",
            column.name(),
            start_time.elapsed().as_millis()
        );
    }

    fn clear_local_view(&mut self) {
        let table = self.sync.table_mut();
        if table.filter().is_empty() && table.sort().is_none() {
            return;
        }
        table.set_filter("");
        table.clear_sort();
        self.set_status_message("Search and local sort cleared");
    }

    fn clear_filters(&mut self) {
        let cleared = self.sync.clear_filters();
        self.sync.table_mut().set_filter("");
        if cleared {
            self.set_status_message("Filters cleared");
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode, prefill: &str) {
        trace!("Entering command mode {:?} ...", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        self.input.clear();
        self.input.set(prefill);
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let mode = self.cmd_mode.take();
        if self.last_input.canceled {
            return;
        }
        let cmd_input = self.last_input.input.clone();
        match mode {
            Some(CMDMode::FreeText) => self.search(&cmd_input),
            Some(CMDMode::AddFilter) => self.apply_filter_input(&cmd_input),
            Some(CMDMode::Export) => self.export(&cmd_input),
            None => info!("Cmd mode is none!"),
        }
    }

    fn search(&mut self, term: &str) {
        let start_time = Instant::now();
        self.sync.table_mut().set_filter(term);
        self.curser_row = 0;
        let table = self.sync.table();
        trace!(
            "Search matched {} of {} rows in {}ms",
            table.filtered_len(),
            table.rows().len(),
            start_time.elapsed().as_millis()
        );
        let message = format!("{} rows match", table.filtered_len());
        self.set_status_message(message);
    }

    /// `name=v1,v2` adds values, `-name=v1` removes them.
    fn apply_filter_input(&mut self, input: &str) {
        let (remove, expression) = match input.trim().strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, input.trim()),
        };
        let Some((name, values)) = parse_filter_input(expression) else {
            self.set_status_message(format!("Unrecognized filter '{input}'"));
            return;
        };
        let changed = if remove {
            values
                .iter()
                .fold(false, |changed, v| self.sync.remove_filter(name, v) || changed)
        } else {
            self.sync.add_filter(name, &values)
        };
        if changed {
            self.set_status_message(format!("Filters: {}", self.active_filters()));
        } else {
            self.set_status_message(format!("Filter {name} unchanged"));
        }
    }

    fn export(&mut self, path: &str) {
        let rows = self.sync.table().export_snapshot();
        let delimiter = self.sync.config().export_delimiter;
        match export::write_file(&rows, path, delimiter) {
            Ok(written) => {
                self.set_status_message(format!("Exported {} rows to {}", rows.len(), written.display()))
            }
            Err(e) => self.set_status_message(e.user_message()),
        }
    }

    fn ask_delete(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        let id = row.id;
        let question = format!("Delete contact {} {} ({id})? [y/n]", row.prenom, row.nom);
        self.popup_message = question;
        self.pending_delete = Some(id);
        self.previous_modus = self.modus;
        self.modus = Modus::CONFIRM;
    }

    fn confirm_input(&mut self, key: KeyEvent) {
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CONFIRM;
        let Some(id) = self.pending_delete.take() else {
            return;
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                self.sync.delete(id);
                self.set_status_message(format!("Deleting contact {id} ..."));
            }
            _ => {
                self.sync.on_dialog_closed(DialogClose::Dismissed);
                self.set_status_message("Delete canceled");
            }
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup_message = HELP_TEXT.to_string();
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    fn copy_table_row(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        let content = export::format_row(row, self.sync.config().export_delimiter);
        let result = match self.clipboard.as_mut() {
            Some(clipboard) => clipboard
                .set_text(content)
                .map_err(|e| ListError::Clipboard(e.to_string())),
            None => Err(ListError::Clipboard("no clipboard available".into())),
        };
        match result {
            Ok(_) => self.set_status_message("Copied row to clipboard."),
            Err(e) => self.set_status_message(e.user_message()),
        }
    }

    fn selected_row(&self) -> Option<&ContactRow> {
        self.sync.table().visible_rows().get(self.curser_row).copied()
    }

    fn clamp_curser(&mut self) {
        let table = self.sync.table();
        let nrows = table.visible_rows().len();
        let ncolumns = table.columns().len();
        self.curser_row = std::cmp::min(self.curser_row, nrows.saturating_sub(1));
        self.curser_column = std::cmp::min(self.curser_column, ncolumns.saturating_sub(1));
    }

    fn active_filters(&self) -> String {
        self.sync
            .filters()
            .options()
            .iter()
            .map(|o| format!("{}={}", o.name, o.values.join(",")))
            .collect::<Vec<String>>()
            .join(" ")
    }

    pub fn get_uidata(&self) -> UIData {
        let table = self.sync.table();
        let state = self.sync.state();

        let header = table
            .columns()
            .iter()
            .map(|c| {
                let mut name = c.name().to_string();
                if c.name() == state.sort_field {
                    name.push_str(if state.ascending { " ▲" } else { " ▼" });
                }
                if let Some((local, ascending)) = table.sort()
                    && local == *c
                {
                    name.push_str(if ascending { " ↑" } else { " ↓" });
                }
                name
            })
            .collect();
        let rows = table
            .visible_rows()
            .iter()
            .map(|r| table.columns().iter().map(|&c| r.cell(c)).collect())
            .collect();

        let mut status = Vec::new();
        if !table.filter().is_empty() {
            status.push(format!("search '{}'", table.filter()));
        }
        if !self.sync.filters().is_empty() {
            status.push(format!("filters {}", self.active_filters()));
        }
        status.push(self.status_message.clone());

        UIData {
            title: format!("Contacts ?{}", self.sync.router().current()),
            page_info: format!(
                "page {}/{}, {} items, local {}/{}",
                state.page,
                self.sync.total_pages(),
                self.sync.total_items(),
                table.page_index() + 1,
                table.page_count()
            ),
            header,
            rows,
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            show_popup: matches!(self.modus, Modus::POPUP | Modus::CONFIRM),
            popup_message: self.popup_message.clone(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            loading: self.status == Status::LOADING,
            status_message: status.join(" | "),
        }
    }
}
