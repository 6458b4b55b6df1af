//! Client-side projection of the last fetched page.
//!
//! The server already paginated the data; this model adds a second tier on top
//! of that page: a free-text filter, a column sort and a local pagination of
//! the rows that pass the filter. None of these trigger a new fetch.

use std::cmp::Ordering;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::trace;

use crate::domain::{Column, ListConfig};
use crate::service::{Contact, ResponsePage};

/// Display-ready copy of one contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRow {
    pub id: i64,
    pub nom: String,
    pub prenom: String,
    pub age: String,
    pub address: String,
    pub action: String,
}

impl ContactRow {
    pub fn cell(&self, column: Column) -> String {
        match column {
            Column::Id => self.id.to_string(),
            Column::Nom => self.nom.clone(),
            Column::Prenom => self.prenom.clone(),
            Column::Age => self.age.clone(),
            Column::Address => self.address.clone(),
            Column::Action => self.action.clone(),
        }
    }
}

impl From<&Contact> for ContactRow {
    fn from(contact: &Contact) -> Self {
        Self {
            id: contact.id,
            nom: contact.nom.clone().unwrap_or_default(),
            prenom: contact.prenom.clone().unwrap_or_default(),
            age: contact.age.map(|a| a.to_string()).unwrap_or_default(),
            address: contact.address.clone().unwrap_or_default(),
            action: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableViewModel {
    columns: Vec<Column>,
    rows: Vec<ContactRow>,
    view: Arc<Vec<usize>>, // Row indices passing the filter, in display order
    filter: String,
    sort: Option<(Column, bool)>,
    page_index: usize,
    page_size: usize,
}

impl TableViewModel {
    pub fn new(columns: Vec<Column>, page_size: usize) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            view: Arc::new(Vec::new()),
            filter: String::new(),
            sort: None,
            page_index: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn from_config(config: &ListConfig) -> Self {
        Self::new(config.columns.clone(), config.local_page_size)
    }

    /// Replace every row with the records of `page`, in server order.
    pub fn rebuild(&mut self, page: &ResponsePage<Contact>) {
        self.rows = page.items.iter().map(ContactRow::from).collect();
        self.page_index = 0;
        self.refresh_view();
        trace!("Rebuilt table with {} rows, {} visible", self.rows.len(), self.view.len());
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[ContactRow] {
        &self.rows
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Case-insensitive substring filter over the displayed columns.
    pub fn set_filter(&mut self, term: &str) {
        self.filter = term.trim().to_lowercase();
        self.page_index = 0;
        self.refresh_view();
    }

    pub fn sort(&self) -> Option<(Column, bool)> {
        self.sort
    }

    pub fn sort_by(&mut self, column: Column, ascending: bool) {
        self.sort = Some((column, ascending));
        self.refresh_view();
    }

    pub fn clear_sort(&mut self) {
        self.sort = None;
        self.refresh_view();
    }

    pub fn filtered_len(&self) -> usize {
        self.view.len()
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.view.len().div_ceil(self.page_size).max(1)
    }

    pub fn next_page(&mut self) -> bool {
        if self.page_index + 1 < self.page_count() {
            self.page_index += 1;
            true
        } else {
            false
        }
    }

    pub fn previous_page(&mut self) -> bool {
        if self.page_index > 0 {
            self.page_index -= 1;
            true
        } else {
            false
        }
    }

    pub fn first_page(&mut self) {
        self.page_index = 0;
    }

    pub fn last_page(&mut self) {
        self.page_index = self.page_count() - 1;
    }

    /// Rows of the current local page.
    pub fn visible_rows(&self) -> Vec<&ContactRow> {
        let begin = self.page_index * self.page_size;
        let end = std::cmp::min(begin + self.page_size, self.view.len());
        self.view
            .get(begin..end)
            .unwrap_or_default()
            .iter()
            .map(|&idx| &self.rows[idx])
            .collect()
    }

    /// Every row passing the filter, in display order, across all local pages.
    pub fn export_snapshot(&self) -> Vec<ContactRow> {
        self.view.iter().map(|&idx| self.rows[idx].clone()).collect()
    }

    fn matches(&self, row: &ContactRow) -> bool {
        self.columns
            .iter()
            .any(|&c| row.cell(c).to_lowercase().contains(&self.filter))
    }

    fn refresh_view(&mut self) {
        let mut indices: Vec<usize> = if self.filter.is_empty() {
            (0..self.rows.len()).collect()
        } else {
            (0..self.rows.len())
                .into_par_iter()
                .filter(|&idx| self.matches(&self.rows[idx]))
                .collect()
        };

        if let Some((column, ascending)) = self.sort {
            let cells: Vec<String> = self.rows.iter().map(|r| r.cell(column)).collect();
            indices.sort_by(|&a, &b| {
                let ordering = compare_cells(&cells[a], &cells[b], column.is_numeric());
                if ascending { ordering } else { ordering.reverse() }
            });
        }

        self.view = Arc::new(indices);
        self.page_index = std::cmp::min(self.page_index, self.page_count() - 1);
    }
}

/// Numeric columns compare as numbers, unparsable values last; otherwise as strings.
fn compare_cells(a: &str, b: &str, numeric: bool) -> Ordering {
    if !numeric {
        return a.to_lowercase().cmp(&b.to_lowercase());
    }
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::default_columns;

    fn contact(id: i64, nom: &str, age: Option<i32>) -> Contact {
        Contact {
            id,
            nom: Some(nom.to_string()),
            prenom: Some(format!("p{id}")),
            age,
            address: None,
            codepostal: None,
        }
    }

    fn page(items: Vec<Contact>) -> ResponsePage<Contact> {
        let total_count = items.len() as u64;
        ResponsePage { items, total_count }
    }

    fn ids(rows: &[&ContactRow]) -> Vec<i64> {
        rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn rebuild_keeps_server_order() {
        let mut table = TableViewModel::new(default_columns(), 10);
        table.rebuild(&page(vec![contact(1, "A", Some(30)), contact(2, "B", None)]));
        assert_eq!(table.rows().len(), 2);
        assert_eq!(ids(&table.visible_rows()), vec![1, 2]);
        assert_eq!(table.rows()[1].age, "");
        assert_eq!(table.rows()[0].action, "");
    }

    #[test]
    fn free_text_filter_is_case_insensitive() {
        let mut table = TableViewModel::new(default_columns(), 10);
        table.rebuild(&page(vec![contact(1, "A", None), contact(2, "B", None)]));
        table.set_filter("b");
        assert_eq!(ids(&table.visible_rows()), vec![2]);
        table.set_filter("  ");
        assert_eq!(table.filtered_len(), 2);
    }

    #[test]
    fn filter_ignores_columns_not_displayed() {
        let mut table = TableViewModel::new(vec![Column::Nom], 10);
        table.rebuild(&page(vec![contact(17, "A", None)]));
        table.set_filter("17");
        assert!(table.visible_rows().is_empty());
    }

    #[test]
    fn empty_page_yields_no_rows() {
        let mut table = TableViewModel::new(default_columns(), 10);
        table.rebuild(&page(vec![contact(1, "A", None)]));
        table.rebuild(&ResponsePage::empty());
        assert!(table.rows().is_empty());
        assert!(table.export_snapshot().is_empty());
        assert_eq!(table.page_count(), 1);
    }

    #[test]
    fn numeric_sort_puts_missing_values_last() {
        let mut table = TableViewModel::new(default_columns(), 10);
        table.rebuild(&page(vec![
            contact(1, "c", Some(40)),
            contact(2, "a", None),
            contact(3, "b", Some(9)),
        ]));
        table.sort_by(Column::Age, true);
        assert_eq!(ids(&table.visible_rows()), vec![3, 1, 2]);
        table.sort_by(Column::Nom, false);
        assert_eq!(ids(&table.visible_rows()), vec![1, 3, 2]);
        table.clear_sort();
        assert_eq!(ids(&table.visible_rows()), vec![1, 2, 3]);
    }

    #[test]
    fn local_pagination_and_filter_reset() {
        let mut table = TableViewModel::new(default_columns(), 2);
        table.rebuild(&page((1..=5).map(|i| contact(i, &format!("n{i}"), None)).collect()));
        assert_eq!(table.page_count(), 3);
        assert!(table.next_page());
        assert!(table.next_page());
        assert!(!table.next_page());
        assert_eq!(ids(&table.visible_rows()), vec![5]);

        table.set_filter("n");
        assert_eq!(table.page_index(), 0);
        table.last_page();
        assert_eq!(table.page_index(), 2);
        assert!(table.previous_page());
        table.first_page();
        assert_eq!(ids(&table.visible_rows()), vec![1, 2]);
    }

    #[test]
    fn export_snapshot_spans_all_local_pages() {
        let mut table = TableViewModel::new(default_columns(), 1);
        table.rebuild(&page(vec![contact(1, "A", None), contact(2, "B", None), contact(3, "AB", None)]));
        table.set_filter("a");
        let snapshot: Vec<i64> = table.export_snapshot().iter().map(|r| r.id).collect();
        assert_eq!(snapshot, vec![1, 3]);
    }
}
