use actix_web::HttpRequest;
use serde::Serialize;

use crate::errors::ApiError;

pub const PAGE_QUERY_PARAM: &str = "page";

#[derive(Serialize, Debug, PartialEq)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Serializes only the rows of the current page
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect::<Result<_, _>>()?,
        })
    }
}

/// Splits results into fixed size pages, `page` is 1-based or the literal `last`
#[derive(Debug, Clone, Copy)]
pub struct PageNumberPagination {
    page_size: usize,
}

impl PageNumberPagination {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// An empty result set still has one (empty) page
    pub fn page_count(&self, count: usize) -> usize {
        count.div_ceil(self.page_size).max(1)
    }

    fn page_number(&self, page: Option<&str>, count: usize) -> Result<usize, ApiError> {
        let page_count = self.page_count(count);

        let number = match page.map(str::trim) {
            None | Some("") => 1,
            Some("last") => page_count,
            Some(value) => value.parse::<usize>().map_err(|_| ApiError::InvalidPage)?,
        };

        if number == 0 || number > page_count {
            return Err(ApiError::InvalidPage);
        }

        Ok(number)
    }

    pub fn paginate<T>(
        &self,
        items: Vec<T>,
        page: Option<&str>,
        req: &HttpRequest,
    ) -> Result<Page<T>, ApiError> {
        let count = items.len();
        let number = self.page_number(page, count)?;

        let results = items
            .into_iter()
            .skip((number - 1) * self.page_size)
            .take(self.page_size)
            .collect();

        let next = (number < self.page_count(count)).then(|| page_url(req, number + 1));
        let previous = (number > 1).then(|| page_url(req, number - 1));

        Ok(Page {
            count,
            next,
            previous,
            results,
        })
    }
}

/// Absolute url of the current request with its page parameter replaced, page 1 drops the parameter
fn page_url(req: &HttpRequest, page: usize) -> String {
    let connection_info = req.connection_info();

    // An undecodable query string keeps none of its parameters
    let mut query: Vec<(String, String)> =
        serde_urlencoded::from_str::<Vec<(String, String)>>(req.query_string())
            .unwrap_or_default()
            .into_iter()
            .filter(|(key, _)| key != PAGE_QUERY_PARAM)
            .collect();

    if page > 1 {
        query.push((PAGE_QUERY_PARAM.to_string(), page.to_string()));
    }

    let mut url = format!(
        "{}://{}{}",
        connection_info.scheme(),
        connection_info.host(),
        req.path()
    );

    if let Ok(encoded) = serde_urlencoded::to_string(&query) {
        if !encoded.is_empty() {
            url.push('?');
            url.push_str(&encoded);
        }
    }

    url
}
