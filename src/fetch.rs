use std::time::Duration;

use log::info;
use reqwest::blocking::Client;

use crate::data::loader::read_csv;
use crate::data::model::Table;
use crate::error::{EtlError, Result};

/// Blocking HTTP client used for every dataset download. Downloads may take
/// as long as they need; the blocking client's 30 s default is switched off.
pub fn client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(None::<Duration>)
        .build()
        .map_err(|e| EtlError::fetch("<client>", e))
}

/// Download the CSV at `url` and parse it into a [`Table`].
///
/// Transport failures and non-2xx responses are both fetch errors; nothing is
/// retried.
pub fn fetch_table(client: &Client, url: &str) -> Result<Table> {
    info!("fetching {url}");
    let response = client.get(url).send().map_err(|e| EtlError::fetch(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(EtlError::fetch(url, format!("HTTP status {status}")));
    }

    let body = response.text().map_err(|e| EtlError::fetch(url, e))?;
    let table = read_csv(body.as_bytes())?;
    let (rows, cols) = table.shape();
    info!("fetched {rows} rows x {cols} columns from {url}");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;

    /// Serve a single HTTP response on a random local port.
    fn serve_once(status: &'static str, body: &'static str) -> String {
        serve_once_after(Duration::ZERO, status, body)
    }

    /// Like [`serve_once`], but wait `delay` after reading the request.
    fn serve_once_after(delay: Duration, status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 {
                if line == "\r\n" {
                    break;
                }
                line.clear();
            }
            std::thread::sleep(delay);
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
        });
        format!("http://{addr}/data.csv")
    }

    #[test]
    fn fetches_and_parses_csv() {
        let url = serve_once("200 OK", "Country,F2000\nChad,0.5\nPeru,\n");
        let table = fetch_table(&client().unwrap(), &url).unwrap();
        assert_eq!(table.shape(), (2, 2));
    }

    #[test]
    fn slow_download_is_not_cut_off() {
        let url = serve_once_after(Duration::from_secs(32), "200 OK", "a,b\n1,2\n");
        let table = fetch_table(&client().unwrap(), &url).unwrap();
        assert_eq!(table.shape(), (1, 2));
    }

    #[test]
    fn non_success_status_is_a_fetch_error() {
        let url = serve_once("404 Not Found", "missing");
        let err = fetch_table(&client().unwrap(), &url).unwrap_err();
        match err {
            EtlError::Fetch { url: failed, reason } => {
                assert_eq!(failed, url);
                assert!(reason.contains("404"), "{reason}");
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[test]
    fn connection_refused_is_a_fetch_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = fetch_table(&client().unwrap(), &format!("http://127.0.0.1:{port}/x.csv"))
            .unwrap_err();
        assert!(matches!(err, EtlError::Fetch { .. }));
    }
}
