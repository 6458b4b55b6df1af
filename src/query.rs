//! Query state derived from the URL, and the two shapes it is converted into:
//! the request sent to the collection endpoint and the parameters written back
//! into the URL on navigation.

use tracing::trace;

use crate::domain::{ASC, DEFAULT_SORT, DESC, PAGE_PARAM, SORT_PARAM};
use crate::filter::{FilterModel, FilterName, FilterOption};
use crate::params::QueryParams;

/// What the list should show. Rebuilt on every navigation, never patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub page: u32,
    pub sort_field: String,
    pub ascending: bool,
    pub filters: Vec<FilterOption>,
}

impl Default for QueryState {
    fn default() -> Self {
        let (sort_field, ascending) = parse_sort_token(DEFAULT_SORT).unwrap_or_default();
        Self {
            page: 1,
            sort_field,
            ascending,
            filters: Vec::new(),
        }
    }
}

/// Request shape of the collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendQuery {
    /// Zero based.
    pub page: u32,
    pub size: u32,
    pub sort: Vec<String>,
    pub filters: Vec<(FilterName, Vec<String>)>,
}

impl BackendQuery {
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("size".to_string(), self.size.to_string()),
        ];
        pairs.extend(self.sort.iter().map(|s| ("sort".to_string(), s.clone())));
        for (name, values) in self.filters.iter() {
            pairs.extend(values.iter().map(|v| (name.to_string(), v.clone())));
        }
        pairs
    }
}

/// `field,direction`, ascending only for the literal `asc`. `None` when malformed.
pub fn parse_sort_token(token: &str) -> Option<(String, bool)> {
    let (field, direction) = token.split_once(',')?;
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    Some((field.to_string(), direction.trim() == ASC))
}

/// Empty when unsorted, otherwise a single `field,asc|desc` token.
pub fn sort_query_param(sort_field: &str, ascending: bool) -> Vec<String> {
    if sort_field.is_empty() {
        return Vec::new();
    }
    let direction = if ascending { ASC } else { DESC };
    vec![format!("{sort_field},{direction}")]
}

fn parse_page(params: &QueryParams) -> u32 {
    params
        .get(PAGE_PARAM)
        .and_then(|p| p.trim().parse::<u32>().ok())
        .filter(|&p| p >= 1)
        .unwrap_or(1)
}

/// Derive the query state of a navigation.
///
/// The sort comes from the URL `sort` parameter when it holds a well formed
/// token. Otherwise `route_default_sort` is tried, then the literal `id,asc`.
pub fn derive_from_route(params: &QueryParams, route_default_sort: Option<&str>) -> QueryState {
    let page = parse_page(params);
    let (sort_field, ascending) = params
        .get(SORT_PARAM)
        .and_then(parse_sort_token)
        .or_else(|| route_default_sort.and_then(parse_sort_token))
        .or_else(|| parse_sort_token(DEFAULT_SORT))
        .unwrap_or_default();
    let filters = FilterModel::from_params(params).options().to_vec();

    let state = QueryState {
        page,
        sort_field,
        ascending,
        filters,
    };
    trace!("Derived {:?} from {}", state, params);
    state
}

pub fn to_backend_query(state: &QueryState, page_size: u32) -> BackendQuery {
    BackendQuery {
        page: state.page.saturating_sub(1),
        size: page_size,
        sort: sort_query_param(&state.sort_field, state.ascending),
        filters: state
            .filters
            .iter()
            .map(|f| (f.name, f.values.clone()))
            .collect(),
    }
}

pub fn to_url_query_params(
    page: u32,
    sort_field: &str,
    ascending: bool,
    filters: &[FilterOption],
) -> QueryParams {
    let mut params = QueryParams::new();
    params.append(PAGE_PARAM, page.max(1).to_string());
    for token in sort_query_param(sort_field, ascending) {
        params.append(SORT_PARAM, token);
    }
    for filter in filters {
        for value in filter.values.iter() {
            params.append(filter.name_as_query_param(), value.clone());
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_to_one() {
        for query in ["", "page=", "page=abc", "page=0", "page=-3"] {
            assert_eq!(derive_from_route(&QueryParams::parse(query), None).page, 1, "{query}");
        }
        assert_eq!(derive_from_route(&QueryParams::parse("page=4"), None).page, 4);
    }

    #[test]
    fn sort_falls_back_to_literal_default() {
        let state = derive_from_route(&QueryParams::new(), None);
        assert_eq!((state.sort_field.as_str(), state.ascending), ("id", true));

        let state = derive_from_route(&QueryParams::parse("sort=nom"), None);
        assert_eq!(state.sort_field, "id");

        let state = derive_from_route(&QueryParams::parse("sort=nom,desc"), Some("age,asc"));
        assert_eq!((state.sort_field.as_str(), state.ascending), ("nom", false));

        let state = derive_from_route(&QueryParams::new(), Some("age,desc"));
        assert_eq!((state.sort_field.as_str(), state.ascending), ("age", false));
    }

    #[test]
    fn only_literal_asc_is_ascending() {
        assert_eq!(parse_sort_token("nom,ASC"), Some(("nom".to_string(), false)));
        assert_eq!(parse_sort_token("nom,asc"), Some(("nom".to_string(), true)));
        assert_eq!(parse_sort_token(",asc"), None);
    }

    #[test]
    fn derive_is_idempotent() {
        let params = QueryParams::parse("page=3&sort=prenom,desc&filter[nom.contains]=a&filter[age.in]=1&filter[age.in]=2");
        assert_eq!(derive_from_route(&params, None), derive_from_route(&params, None));
    }

    #[test]
    fn backend_query_is_zero_based() {
        let params = QueryParams::parse("page=3&sort=nom,desc&filter[nom.contains]=du");
        let query = to_backend_query(&derive_from_route(&params, None), 20);
        assert_eq!(query.page, 2);
        assert_eq!(query.size, 20);
        assert_eq!(query.sort, vec!["nom,desc".to_string()]);
        assert_eq!(
            query.to_pairs(),
            vec![
                ("page".to_string(), "2".to_string()),
                ("size".to_string(), "20".to_string()),
                ("sort".to_string(), "nom,desc".to_string()),
                ("nom.contains".to_string(), "du".to_string()),
            ]
        );
    }

    #[test]
    fn unsorted_sends_no_sort() {
        let state = QueryState {
            sort_field: String::new(),
            ..QueryState::default()
        };
        assert!(to_backend_query(&state, 20).sort.is_empty());
        assert_eq!(to_url_query_params(1, "", true, &[]).get(SORT_PARAM), None);
    }

    #[test]
    fn url_params_round_trip_page_and_sort() {
        for query in ["page=1&sort=id,asc", "page=7&sort=nom,desc", "page=2&sort=age,asc&filter[nom.equals]=x"] {
            let params = QueryParams::parse(query);
            let state = derive_from_route(&params, None);
            let back = to_url_query_params(state.page, &state.sort_field, state.ascending, &state.filters);
            assert_eq!(back.get(PAGE_PARAM), params.get(PAGE_PARAM));
            assert_eq!(back.get_all(SORT_PARAM), params.get_all(SORT_PARAM));
            assert_eq!(back, params);
        }
    }
}
