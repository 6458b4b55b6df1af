//! Named filters of the contact list.
//!
//! A filter name is `<field>.<operator>` as understood by the collection
//! endpoint (`nom.contains`, `age.greaterThan`, ...). Names and values are
//! validated when they enter the model: an unknown name is ignored and a value
//! that does not fit its field is dropped, never coerced.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::params::QueryParams;
use crate::subscription::{Emitter, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterField {
    Id,
    Nom,
    Prenom,
    Age,
    Address,
    Codepostal,
}

impl FilterField {
    fn as_str(&self) -> &'static str {
        match self {
            FilterField::Id => "id",
            FilterField::Nom => "nom",
            FilterField::Prenom => "prenom",
            FilterField::Age => "age",
            FilterField::Address => "address",
            FilterField::Codepostal => "codepostal",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, FilterField::Id | FilterField::Age | FilterField::Codepostal)
    }
}

impl FromStr for FilterField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(FilterField::Id),
            "nom" => Ok(FilterField::Nom),
            "prenom" => Ok(FilterField::Prenom),
            "age" => Ok(FilterField::Age),
            "address" => Ok(FilterField::Address),
            "codepostal" => Ok(FilterField::Codepostal),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    DoesNotContain,
    In,
    NotIn,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Specified,
}

impl Operator {
    fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "notEquals",
            Operator::Contains => "contains",
            Operator::DoesNotContain => "doesNotContain",
            Operator::In => "in",
            Operator::NotIn => "notIn",
            Operator::GreaterThan => "greaterThan",
            Operator::GreaterThanOrEqual => "greaterThanOrEqual",
            Operator::LessThan => "lessThan",
            Operator::LessThanOrEqual => "lessThanOrEqual",
            Operator::Specified => "specified",
        }
    }

    fn is_textual(&self) -> bool {
        matches!(self, Operator::Contains | Operator::DoesNotContain)
    }

    fn is_ordering(&self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::GreaterThanOrEqual
                | Operator::LessThan
                | Operator::LessThanOrEqual
        )
    }
}

impl FromStr for Operator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" => Ok(Operator::Equals),
            "notEquals" => Ok(Operator::NotEquals),
            "contains" => Ok(Operator::Contains),
            "doesNotContain" => Ok(Operator::DoesNotContain),
            "in" => Ok(Operator::In),
            "notIn" => Ok(Operator::NotIn),
            "greaterThan" => Ok(Operator::GreaterThan),
            "greaterThanOrEqual" => Ok(Operator::GreaterThanOrEqual),
            "lessThan" => Ok(Operator::LessThan),
            "lessThanOrEqual" => Ok(Operator::LessThanOrEqual),
            "specified" => Ok(Operator::Specified),
            _ => Err(()),
        }
    }
}

/// A recognized filter name. Only field/operator pairs the endpoint accepts can be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterName {
    pub field: FilterField,
    pub operator: Operator,
}

impl FilterName {
    pub fn new(field: FilterField, operator: Operator) -> Option<Self> {
        let allowed = if field.is_numeric() {
            !operator.is_textual()
        } else {
            !operator.is_ordering()
        };
        allowed.then_some(Self { field, operator })
    }

    /// Validate one raw value for this filter.
    pub fn accepts(&self, value: &str) -> bool {
        if self.operator == Operator::Specified {
            return value == "true" || value == "false";
        }
        if self.field.is_numeric() {
            return value.trim().parse::<i64>().is_ok();
        }
        !value.is_empty()
    }
}

impl FromStr for FilterName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, operator) = s.split_once('.').ok_or(())?;
        FilterName::new(field.parse()?, operator.parse()?).ok_or(())
    }
}

impl fmt::Display for FilterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.field.as_str(), self.operator.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOption {
    pub name: FilterName,
    pub values: Vec<String>,
}

impl FilterOption {
    pub fn new(name: FilterName) -> Self {
        Self { name, values: Vec::new() }
    }

    /// The URL query-parameter key; differs from the backend key on purpose.
    pub fn name_as_query_param(&self) -> String {
        format!("filter[{}]", self.name)
    }

    /// The key understood by the collection endpoint.
    pub fn name_as_backend_param(&self) -> String {
        self.name.to_string()
    }

    /// Add valid, not yet present values. Returns whether anything was added.
    fn add_values<S: AsRef<str>>(&mut self, values: &[S]) -> bool {
        let mut added = false;
        for value in values.iter().map(|v| v.as_ref().trim()) {
            if !self.name.accepts(value) {
                debug!("Dropping invalid value {value:?} for filter {}", self.name);
                continue;
            }
            if !self.values.iter().any(|v| v == value) {
                self.values.push(value.to_string());
                added = true;
            }
        }
        added
    }

    fn remove_value(&mut self, value: &str) -> bool {
        let before = self.values.len();
        self.values.retain(|v| v != value);
        before != self.values.len()
    }
}

/// Parse a `filter[<name>]` URL key.
fn filter_name_from_query_param(key: &str) -> Option<FilterName> {
    key.strip_prefix("filter[")?.strip_suffix(']')?.parse().ok()
}

/// The set of active filters; notifies subscribers on every user change.
#[derive(Debug, Default)]
pub struct FilterModel {
    options: Vec<FilterOption>,
    changes: Emitter<Vec<FilterOption>>,
}

impl FilterModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: &QueryParams) -> Self {
        let mut model = Self::new();
        model.initialize_from_params(params);
        model
    }

    /// Replace the set from URL parameters without notifying. Returns whether it changed.
    pub fn initialize_from_params(&mut self, params: &QueryParams) -> bool {
        let previous = std::mem::take(&mut self.options);
        for key in params.keys() {
            let Some(name) = filter_name_from_query_param(key) else {
                trace!("Ignoring unrecognized query parameter {key}");
                continue;
            };
            let values = params.get_all(key);
            self.option_mut(name).add_values(&values);
        }
        self.options.retain(|o| !o.values.is_empty());
        previous != self.options
    }

    pub fn options(&self) -> &[FilterOption] {
        &self.options
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn subscribe(&mut self) -> Subscription<Vec<FilterOption>> {
        self.changes.subscribe()
    }

    pub fn add_filter<S: AsRef<str>>(&mut self, name: FilterName, values: &[S]) -> bool {
        let added = self.option_mut(name).add_values(values);
        self.options.retain(|o| !o.values.is_empty());
        if added {
            self.changed();
        }
        added
    }

    pub fn remove_filter(&mut self, name: FilterName, value: &str) -> bool {
        let removed = self
            .options
            .iter_mut()
            .find(|o| o.name == name)
            .is_some_and(|o| o.remove_value(value));
        if removed {
            self.options.retain(|o| !o.values.is_empty());
            self.changed();
        }
        removed
    }

    pub fn clear(&mut self) -> bool {
        if self.options.is_empty() {
            return false;
        }
        self.options.clear();
        self.changed();
        true
    }

    fn option_mut(&mut self, name: FilterName) -> &mut FilterOption {
        let idx = match self.options.iter().position(|o| o.name == name) {
            Some(idx) => idx,
            None => {
                self.options.push(FilterOption::new(name));
                self.options.len() - 1
            }
        };
        &mut self.options[idx]
    }

    fn changed(&mut self) {
        trace!("Filters changed: {:?}", self.options);
        self.changes.emit(self.options.clone());
    }
}

/// Parse user input of the form `nom.contains=dup` or `age.in=1,2`.
pub fn parse_filter_input(input: &str) -> Option<(FilterName, Vec<String>)> {
    let (name, values) = input.split_once('=')?;
    let name = name.trim().parse().ok()?;
    let values = values.split(',').map(|v| v.trim().to_string()).collect();
    Some((name, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> FilterName {
        s.parse().unwrap()
    }

    #[test]
    fn names_follow_field_kinds() {
        assert!("nom.contains".parse::<FilterName>().is_ok());
        assert!("age.greaterThan".parse::<FilterName>().is_ok());
        assert!("age.contains".parse::<FilterName>().is_err());
        assert!("nom.lessThan".parse::<FilterName>().is_err());
        assert!("email.equals".parse::<FilterName>().is_err());
        assert!("nom".parse::<FilterName>().is_err());
        assert_eq!(name("codepostal.notIn").to_string(), "codepostal.notIn");
    }

    #[test]
    fn query_param_key_differs_from_backend_key() {
        let option = FilterOption::new(name("prenom.equals"));
        assert_eq!(option.name_as_query_param(), "filter[prenom.equals]");
        assert_eq!(option.name_as_backend_param(), "prenom.equals");
    }

    #[test]
    fn initialize_ignores_unknown_keys_and_drops_invalid_values() {
        let params = QueryParams::parse(
            "page=2&filter[nom.contains]=dup&filter[age.in]=3&filter[age.in]=x&filter[foo.equals]=1&filter[age.specified]=maybe",
        );
        let model = FilterModel::from_params(&params);
        assert_eq!(
            model.options(),
            &[
                FilterOption { name: name("nom.contains"), values: vec!["dup".into()] },
                FilterOption { name: name("age.in"), values: vec!["3".into()] },
            ]
        );
    }

    #[test]
    fn initialize_reports_change_without_notifying() {
        let mut model = FilterModel::new();
        let mut changes = model.subscribe();
        assert!(model.initialize_from_params(&QueryParams::parse("filter[nom.equals]=a")));
        assert!(!model.initialize_from_params(&QueryParams::parse("filter[nom.equals]=a")));
        assert_eq!(changes.try_recv(), None);
    }

    #[test]
    fn user_changes_notify_once_per_effective_change() {
        let mut model = FilterModel::new();
        let mut changes = model.subscribe();

        assert!(model.add_filter(name("nom.contains"), &["dup", "dup"]));
        assert_eq!(changes.try_recv().map(|o| o.len()), Some(1));
        assert!(!model.add_filter(name("nom.contains"), &["dup"]));
        assert!(!model.add_filter(name("age.equals"), &["old"]));
        assert_eq!(changes.try_recv(), None);
        assert_eq!(model.options().len(), 1);

        assert!(model.remove_filter(name("nom.contains"), "dup"));
        assert!(model.is_empty());
        assert_eq!(changes.try_recv(), Some(Vec::new()));

        assert!(!model.clear());
        model.add_filter(name("age.lessThan"), &["40"]);
        assert!(model.clear());
        assert_eq!(changes.try_recv().map(|o| o.len()), Some(1));
        assert_eq!(changes.try_recv(), Some(Vec::new()));
    }

    #[test]
    fn filter_input_parsing() {
        let (n, values) = parse_filter_input("age.in = 1, 2").unwrap();
        assert_eq!(n, name("age.in"));
        assert_eq!(values, vec!["1", "2"]);
        assert!(parse_filter_input("nonsense").is_none());
    }
}
