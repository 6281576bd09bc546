use maud::{DOCTYPE, Markup, PreEscaped, html};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::{
    listing::{Breadcrumb, FileEntry},
    policy::Identity,
};

/// Characters left alone inside a single path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const BASE_CSS: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 60rem; margin: 0 auto; padding: 1rem; color: #222; }
header { display: flex; justify-content: space-between; align-items: center; border-bottom: 1px solid #ddd; }
header nav a { margin-left: 1rem; }
table { width: 100%; border-collapse: collapse; }
td, th { padding: .4rem; border-bottom: 1px solid #eee; text-align: left; }
.crumbs a::after { content: " /"; color: #999; }
.msg-ok { color: #1a7f37; }
.msg-err { color: #cf222e; }
pre { background: #f6f8fa; padding: 1rem; overflow-x: auto; }
form.inline { display: inline; margin: 0; }
"#;

/// Percent-encode a value for use in a query string.
pub fn urlencoded(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

/// Link to the listing of a relative directory path.
pub fn browse_href(path: &str) -> String {
    let encoded: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
        .collect();
    if encoded.is_empty() {
        "/".to_string()
    } else {
        format!("/browse/{}", encoded.join("/"))
    }
}

pub fn download_href(path: &str) -> String {
    format!("/download?filename={}", urlencoded(path))
}

pub fn preview_href(path: &str) -> String {
    format!("/preview?filename={}", urlencoded(path))
}

fn layout(site_title: &str, page_title: &str, identity: &Identity, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (page_title) }
                style { (PreEscaped(BASE_CSS)) }
            }
            body {
                header {
                    h1 { a href="/" { (site_title) } }
                    nav {
                        @match identity.name() {
                            Some(name) => {
                                span { "Signed in as " strong { (name) } }
                                a href="/upload" { "Upload" }
                                a href="/logout" { "Log out" }
                            }
                            None => {
                                a href="/login" { "Log in" }
                            }
                        }
                    }
                }
                main { (body) }
            }
        }
    }
}

/// Directory listing page.
pub fn index_page(
    site_title: &str,
    directory: &str,
    entries: &[FileEntry],
    crumbs: &[Breadcrumb],
    identity: &Identity,
) -> Markup {
    let page_title = if directory.is_empty() {
        site_title.to_string()
    } else {
        format!("{site_title} - Browse")
    };
    let body = html! {
        nav class="crumbs" aria-label="breadcrumb" {
            @for crumb in crumbs {
                a href=(browse_href(&crumb.path)) { (crumb.name) }
            }
        }
        @if entries.is_empty() {
            p { em { "Empty directory." } }
        } @else {
            table {
                thead {
                    tr { th { "Name" } th { "Size" } th { "" } }
                }
                tbody {
                    @for e in entries {
                        tr {
                            td {
                                @if e.is_dir {
                                    a href=(browse_href(&e.path)) { (e.name) "/" }
                                } @else {
                                    a href=(preview_href(&e.path)) { (e.name) }
                                }
                            }
                            td { (e.size) }
                            td {
                                a href=(download_href(&e.path)) {
                                    @if e.is_dir { "Download zip" } @else { "Download" }
                                }
                                @if e.is_admin {
                                    " "
                                    form class="inline" method="post" action="/delete" {
                                        input type="hidden" name="filename" value=(e.path);
                                        button type="submit" { "Delete" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    };
    layout(site_title, &page_title, identity, body)
}

pub fn login_page(site_title: &str, username: &str, error: Option<&str>) -> Markup {
    let body = html! {
        h2 { "Log in" }
        @if let Some(msg) = error {
            p class="msg-err" { (msg) }
        }
        form method="post" action="/login" {
            p {
                label for="username" { "Username" } br;
                input type="text" id="username" name="username" value=(username) autofocus;
            }
            p {
                label for="password" { "Password" } br;
                input type="password" id="password" name="password";
            }
            button type="submit" { "Log in" }
        }
    };
    layout(
        site_title,
        &format!("{site_title} - Log in"),
        &Identity::Anonymous,
        body,
    )
}

/// Outcome line shown above the upload form.
pub struct Notice<'a> {
    pub success: bool,
    pub message: &'a str,
}

pub fn upload_page(
    site_title: &str,
    directory: &str,
    notice: Option<Notice<'_>>,
    identity: &Identity,
) -> Markup {
    let body = html! {
        h2 { "Upload files" }
        @if let Some(n) = notice {
            p class=(if n.success { "msg-ok" } else { "msg-err" }) { (n.message) }
        }
        form method="post" action="/upload" enctype="multipart/form-data" {
            input type="hidden" name="directory" value=(directory);
            p { input type="file" name="files" multiple; }
            button type="submit" { "Upload" }
        }
        p { a href=(browse_href(directory)) { "Back to the file list" } }
    };
    layout(
        site_title,
        &format!("{site_title} - Upload files"),
        identity,
        body,
    )
}

pub fn text_preview_page(
    site_title: &str,
    path: &str,
    content: &str,
    identity: &Identity,
) -> Markup {
    let body = html! {
        h2 { (path) }
        p { a href=(download_href(path)) { "Download" } }
        pre { code { (content) } }
    };
    layout(site_title, &format!("{site_title} - {path}"), identity, body)
}

/// Fallback for files we do not render inline.
pub fn no_preview_page(site_title: &str, path: &str, identity: &Identity) -> Markup {
    let body = html! {
        h2 { (path) }
        p { "No preview is available for this file type." }
        p { a href=(download_href(path)) { "Download" } }
    };
    layout(site_title, &format!("{site_title} - {path}"), identity, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browse_links_encode_segments() {
        assert_eq!(browse_href(""), "/");
        assert_eq!(browse_href("a b/c&d"), "/browse/a%20b/c%26d");
    }

    #[test]
    fn query_links_encode_separators() {
        assert_eq!(download_href("a/b c.txt"), "/download?filename=a%2Fb%20c%2Etxt");
    }

    #[test]
    fn delete_control_follows_admin_flag() {
        let entry = |is_admin| FileEntry {
            name: "x.txt".into(),
            path: "x.txt".into(),
            size: "1 B".into(),
            is_dir: false,
            is_admin,
        };
        let crumbs = crate::listing::breadcrumbs("");
        let admin = index_page("T", "", &[entry(true)], &crumbs, &Identity::Admin("a".into()));
        assert!(admin.into_string().contains("action=\"/delete\""));
        let anon = index_page("T", "", &[entry(false)], &crumbs, &Identity::Anonymous);
        assert!(!anon.into_string().contains("action=\"/delete\""));
    }

    #[test]
    fn preview_escapes_content() {
        let page = text_preview_page("T", "x.html", "<script>alert(1)</script>", &Identity::Anonymous);
        let html = page.into_string();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>alert"));
    }
}
