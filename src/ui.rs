use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use contact_tv::domain::CMDMode;

use crate::model::{Model, UIData};

pub const TITLE_HEIGHT: u16 = 1;
pub const CMDLINE_HEIGH: u16 = 1;
pub const COLUMN_SPACING: u16 = 1;

pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self {
            table_state: TableState::default(),
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [title_area, table_area, status_area] = Layout::vertical([
            Constraint::Length(TITLE_HEIGHT),
            Constraint::Min(1),
            Constraint::Length(CMDLINE_HEIGH),
        ])
        .areas(frame.area());

        render_title(&uidata, frame, title_area);
        self.render_table(&uidata, frame, table_area);
        render_statusline(&uidata, frame, status_area);

        if uidata.show_popup {
            render_popup(&uidata.popup_message, frame);
        }
    }

    fn render_table(&mut self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let header = Row::new(uidata.header.iter().map(|h| Cell::from(h.as_str())))
            .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Yellow));
        let rows = uidata
            .rows
            .iter()
            .map(|r| Row::new(r.iter().map(|c| Cell::from(c.as_str()))));
        let widths = uidata
            .header
            .iter()
            .map(|_| Constraint::Fill(1))
            .collect::<Vec<Constraint>>();

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(COLUMN_SPACING)
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .cell_highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

        if uidata.rows.is_empty() {
            self.table_state.select(None);
        } else {
            self.table_state.select(Some(uidata.selected_row));
            self.table_state.select_column(Some(uidata.selected_column));
        }
        frame.render_stateful_widget(table, area, &mut self.table_state);
    }
}

fn render_title(uidata: &UIData, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::from(format!(" {} ", uidata.title)).bold(),
        Span::from(format!(" {} ", uidata.page_info)).dark_gray(),
    ];
    if uidata.loading {
        spans.push(Span::from(" loading ... ").yellow());
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_statusline(uidata: &UIData, frame: &mut Frame, area: Rect) {
    if uidata.active_cmdinput {
        let prompt = match uidata.cmd_mode {
            Some(CMDMode::FreeText) => "/",
            Some(CMDMode::AddFilter) => "filter: ",
            Some(CMDMode::Export) => "export to: ",
            None => ":",
        };
        let line = Line::from(vec![
            Span::from(prompt).blue().bold(),
            Span::from(uidata.cmdinput.input.as_str()),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        let offset = prompt.chars().count() + uidata.cmdinput.curser_pos;
        frame.set_cursor_position((area.x + offset as u16, area.y));
    } else {
        let line = Line::from(uidata.status_message.as_str()).dark_gray();
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn render_popup(message: &str, frame: &mut Frame) {
    let area = popup_area(frame.area(), 60, 60);
    let block = Block::bordered().title(" ctv ".bold());
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(message).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(ratatui::layout::Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(ratatui::layout::Flex::Center)
        .areas(area);
    area
}
