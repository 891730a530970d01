use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{
        Block, Cell, Clear, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table, TableState as WidgetTableState,
    },
};
use sift::domain::CMDMode;
use sift::editor::Region;

use crate::model::{Model, UIData, UILayout};

pub const CMDLINE_HEIGH: usize = 2;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

const EDITOR_HEIGHT: u16 = 3;
const EDITOR_MAX_WIDTH: u16 = 60;
const POPUP_WIDTH: u16 = 50;

/// Where the filter editor popup is drawn. The model registers the same area
/// for outside-click detection.
pub fn editor_region(layout: &UILayout) -> Region {
    let width = u16::try_from(layout.width).unwrap_or(u16::MAX);
    let height = u16::try_from(layout.height).unwrap_or(u16::MAX);
    let editor_width = std::cmp::min(EDITOR_MAX_WIDTH, width.saturating_sub(4)).max(10);
    Region::new(
        width.saturating_sub(editor_width) / 2,
        height / 3,
        editor_width,
        EDITOR_HEIGHT,
    )
}

fn to_rect(region: Region) -> Rect {
    Rect::new(region.x, region.y, region.width, region.height)
}

#[derive(Debug, Default)]
pub struct TableUI {}

impl TableUI {
    pub fn new() -> Self {
        Self {}
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [table_area, status_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(CMDLINE_HEIGH as u16),
        ])
        .areas(frame.area());

        self.draw_table(uidata, frame, table_area);
        self.draw_statusline(uidata, frame, status_area);

        if uidata.show_popup {
            self.draw_popup(uidata, frame);
        }
        if uidata.active_cmdinput {
            self.draw_editor(uidata, frame);
        }
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let [table_area, scrollbar_area] = Layout::horizontal([
            Constraint::Min(1),
            Constraint::Length(SCROLLBAR_WIDTH as u16),
        ])
        .areas(area);

        let header = Row::new(
            uidata
                .table
                .iter()
                .map(|c| Cell::from(c.name.clone()).bold()),
        )
        .height(TABLE_HEADER_HEIGHT as u16)
        .style(Style::default().fg(Color::Yellow));

        let nvisible = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);
        let rows = (0..nvisible).map(|ridx| {
            Row::new(
                uidata
                    .table
                    .iter()
                    .map(|c| Cell::from(c.data[ridx].clone())),
            )
        });
        let widths = uidata
            .table
            .iter()
            .map(|c| Constraint::Length(c.width as u16));

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(0)
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .cell_highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

        let mut state = WidgetTableState::default()
            .with_selected(if nvisible > 0 {
                Some(uidata.selected_row)
            } else {
                None
            })
            .with_selected_column(Some(uidata.selected_column));
        frame.render_stateful_widget(table, table_area, &mut state);

        let mut scrollbar_state =
            ScrollbarState::new(uidata.nrows).position(uidata.abs_selected_row);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            scrollbar_area,
            &mut scrollbar_state,
        );
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let position = if uidata.nrows == 0 {
            "no rows".to_string()
        } else {
            format!("{}/{}", uidata.abs_selected_row + 1, uidata.nrows)
        };
        let mut info = vec![
            Span::from(format!(" {} ", uidata.name)).bold().reversed(),
            Span::from(format!(" {position} of {} ", uidata.total_rows)),
            Span::from(format!("| {} ", uidata.sort_label)).blue(),
        ];
        if uidata.nfilters > 0 {
            info.push(Span::from(format!("| {} filter(s) ", uidata.nfilters)).yellow());
        }
        if !uidata.global_search.is_empty() {
            info.push(Span::from(format!("| search \"{}\" ", uidata.global_search)).yellow());
        }

        let lines = vec![
            Line::from(info),
            Line::from(uidata.status_message.clone()).italic(),
        ];
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn draw_popup(&self, uidata: &UIData, frame: &mut Frame) {
        let area = frame.area();
        let nlines = uidata.popup_message.lines().count() as u16 + 2;
        let width = std::cmp::min(POPUP_WIDTH, area.width);
        let height = std::cmp::min(nlines, area.height);
        let popup = Rect::new(
            area.x + (area.width - width) / 2,
            area.y + (area.height - height) / 2,
            width,
            height,
        );

        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .title_bottom(Line::from(vec![" Close ".into(), "<Esc> ".blue().bold()]).centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(uidata.popup_message.clone()).block(block),
            popup,
        );
    }

    fn draw_editor(&self, uidata: &UIData, frame: &mut Frame) {
        let area = to_rect(editor_region(&uidata.layout)).intersection(frame.area());
        if area.is_empty() {
            return;
        }
        let title = match &uidata.cmd_mode {
            Some(CMDMode::ColumnFilter(key)) => format!(" Filter {key} "),
            Some(CMDMode::GlobalSearch) => " Search ".to_string(),
            None => String::new(),
        };
        let block = Block::bordered()
            .title(Line::from(Span::from(title).bold()))
            .title_bottom(Line::from(vec![
                " Apply ".into(),
                "<Enter>".blue().bold(),
                " Cancel ".into(),
                "<Esc> ".blue().bold(),
            ]))
            .border_set(border::ROUNDED);

        let inner_width = area.width.saturating_sub(2) as usize;
        let offset = input_scroll(uidata.cmdinput.cursor_pos, inner_width);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(uidata.cmdinput.input.clone())
                .scroll((0, u16::try_from(offset).unwrap_or(u16::MAX)))
                .block(block),
            area,
        );

        let column = (uidata.cmdinput.cursor_pos - offset) as u16;
        frame.set_cursor_position((area.x.saturating_add(1).saturating_add(column), area.y + 1));
    }
}

/// Horizontal scroll that keeps the cursor inside a line of `width` cells.
fn input_scroll(cursor_pos: usize, width: usize) -> usize {
    if width == 0 {
        return cursor_pos;
    }
    (cursor_pos + 1).saturating_sub(width)
}
