use serde_json::json;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tower_lsp::lsp_types::Url;

struct Server {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
}

impl Server {
    async fn start(root: &std::path::Path) -> anyhow::Result<Self> {
        let mut child = Command::new(env!("CARGO_BIN_EXE_btexd"))
            .current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("no stdout"))?;
        let mut server = Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
        };

        server
            .send(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {
                    "capabilities": {},
                    "rootUri": Url::from_directory_path(root).unwrap(),
                    "processId": std::process::id(),
                    "initializationOptions": { "validationDelayMs": 50 }
                }
            }))
            .await?;
        server.wait_for(|msg| msg["id"] == 1).await?;
        server
            .send(&json!({ "jsonrpc": "2.0", "method": "initialized", "params": {} }))
            .await?;
        Ok(server)
    }

    async fn send(&mut self, msg: &serde_json::Value) -> anyhow::Result<()> {
        send_msg(&mut self.stdin, msg).await
    }

    /// Reads messages until one satisfies `pred`, skipping log notifications.
    async fn wait_for(
        &mut self,
        pred: impl Fn(&serde_json::Value) -> bool,
    ) -> anyhow::Result<serde_json::Value> {
        let reader = &mut self.reader;
        let wait = async {
            loop {
                let msg = read_msg(reader).await?;
                if pred(&msg) {
                    return Ok::<_, anyhow::Error>(msg);
                }
            }
        };
        match timeout(Duration::from_secs(30), wait).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("timed out waiting for a message"),
        }
    }
}

fn did_open(uri: &Url, text: &str) -> serde_json::Value {
    json!({
        "jsonrpc": "2.0",
        "method": "textDocument/didOpen",
        "params": {
            "textDocument": {
                "uri": uri,
                "languageId": "btex",
                "version": 1,
                "text": text
            }
        }
    })
}

fn is_diagnostics_for(msg: &serde_json::Value, uri: &Url) -> bool {
    msg["method"] == "textDocument/publishDiagnostics" && msg["params"]["uri"] == uri.as_str()
}

#[tokio::test]
async fn test_unclosed_brace_is_published() -> anyhow::Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let root = temp_dir.path().canonicalize()?;
    let mut server = Server::start(&root).await?;

    let uri = Url::from_file_path(root.join("main.btex")).unwrap();
    server.send(&did_open(&uri, "{ { }")).await?;

    let msg = server.wait_for(|msg| is_diagnostics_for(msg, &uri)).await?;
    let diagnostics = msg["params"]["diagnostics"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["source"], "btex-structure");
    assert_eq!(diagnostics[0]["code"], "unclosed-delimiter");
    // The outer brace is the one left open.
    assert_eq!(diagnostics[0]["range"]["start"], json!({"line": 0, "character": 0}));

    server.child.kill().await?;
    Ok(())
}

#[tokio::test]
async fn test_fixing_the_document_clears_diagnostics() -> anyhow::Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let root = temp_dir.path().canonicalize()?;
    let mut server = Server::start(&root).await?;

    let uri = Url::from_file_path(root.join("fix.btex")).unwrap();
    server.send(&did_open(&uri, "\\begin{proof}\n")).await?;
    server.wait_for(|msg| is_diagnostics_for(msg, &uri)).await?;

    server
        .send(&json!({
            "jsonrpc": "2.0",
            "method": "textDocument/didChange",
            "params": {
                "textDocument": { "uri": uri, "version": 2 },
                "contentChanges": [{
                    "range": {
                        "start": { "line": 1, "character": 0 },
                        "end": { "line": 1, "character": 0 }
                    },
                    "text": "\\end{proof}"
                }]
            }
        }))
        .await?;

    let msg = server.wait_for(|msg| is_diagnostics_for(msg, &uri)).await?;
    assert_eq!(msg["params"]["diagnostics"], json!([]));

    server.child.kill().await?;
    Ok(())
}

#[tokio::test]
async fn test_detect_mode_command() -> anyhow::Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let root = temp_dir.path().canonicalize()?;
    let mut server = Server::start(&root).await?;

    let uri = Url::from_file_path(root.join("mode.btex")).unwrap();
    server.send(&did_open(&uri, "text $x$")).await?;
    server
        .send(&json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "workspace/executeCommand",
            "params": {
                "command": "btex.detectMode",
                "arguments": [uri, { "line": 0, "character": 6 }]
            }
        }))
        .await?;

    let msg = server.wait_for(|msg| msg["id"] == 2).await?;
    assert_eq!(msg["result"], "math");

    server.child.kill().await?;
    Ok(())
}

async fn send_msg<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    msg: &serde_json::Value,
) -> anyhow::Result<()> {
    let s = msg.to_string();
    writer
        .write_all(format!("Content-Length: {}\r\n\r\n{}", s.len(), s).as_bytes())
        .await?;
    writer.flush().await?;
    Ok(())
}

async fn read_msg<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> anyhow::Result<serde_json::Value> {
    let mut content_length = 0;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            anyhow::bail!("EOF while reading headers");
        }
        if line == "\r\n" || line == "\n" {
            break;
        }
        if let Some(rest) = line.trim().strip_prefix("Content-Length: ") {
            content_length = rest.parse()?;
        }
    }

    if content_length == 0 {
        anyhow::bail!("No Content-Length header found");
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;
    Ok(serde_json::from_slice(&body)?)
}
