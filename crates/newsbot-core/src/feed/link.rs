use url::Url;

const TRACKING_PREFIX: &str = "utm_";

/// Strip tracking parameters (`utm_*`) from an article link.
///
/// Some feeds append a per-channel `utm_source` to every link, which would otherwise make
/// the same article look different between polls. Links that do not parse are returned
/// trimmed but otherwise untouched.
pub fn canonical_link(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    if url.query().is_none() {
        return raw.to_string();
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !key.starts_with(TRACKING_PREFIX))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.to_string()
}
