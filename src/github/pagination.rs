//! Repository count estimation
//!
//! `GET /user/repos` does not report a total. The `Link` header only
//! tells which page is the last one, so the total derived from it is an
//! estimate: the last page may hold fewer items than a full page.

use url::Url;

/// Page size GitHub uses when `per_page` is not given
pub const DEFAULT_PAGE_SIZE: u32 = 30;

/// Largest `per_page` GitHub accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Find the page number of the `rel="last"` link
///
/// Example header:
/// `<https://api.github.com/user/repos?page=2>; rel="next", <https://api.github.com/user/repos?page=5>; rel="last"`
pub fn last_page_from_link_header(link: &str) -> Option<u32> {
    page_for_rel(link, "last")
}

fn page_for_rel(link: &str, wanted: &str) -> Option<u32> {
    link.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_wanted = pieces.any(|param| {
            let param = param.trim();
            param
                .strip_prefix("rel=")
                .map(|rel| rel.trim_matches('"').split_whitespace().any(|r| r == wanted))
                .unwrap_or(false)
        });
        if !is_wanted {
            return None;
        }

        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        let url = Url::parse(target).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse::<u32>().ok())
    })
}

/// Total number of repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalEstimate {
    pub total: u64,
    /// `false` when the total is exact
    pub approximate: bool,
}

/// Estimate the total number of repositories
///
/// # Arguments
/// * `link` - `Link` header of the page response
/// * `page` - Requested page (1-based)
/// * `per_page` - Requested page size
/// * `returned` - Items in the page response
///
/// # Rules
/// - last page P advertised: `P * per_page` (approximate)
/// - no last page but past page 1: this is the last page, so
///   `(page - 1) * per_page + returned` (exact)
/// - empty page past page 1: the request overshot the end and the
///   real total is unknown, so `returned` (approximate)
/// - otherwise: `returned` (exact)
pub fn estimate_total(link: Option<&str>, page: u32, per_page: u32, returned: usize) -> TotalEstimate {
    if let Some(last_page) = link.and_then(last_page_from_link_header) {
        return TotalEstimate {
            total: u64::from(last_page) * u64::from(per_page),
            approximate: true,
        };
    }

    if page > 1 {
        return match returned {
            0 => TotalEstimate {
                total: 0,
                approximate: true,
            },
            _ => TotalEstimate {
                total: u64::from(page - 1) * u64::from(per_page) + returned as u64,
                approximate: false,
            },
        };
    }

    TotalEstimate {
        total: returned as u64,
        approximate: false,
    }
}
