use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use docfill::{AppState, HttpServer, ServerConfig, make_http_server};
use docfill_docx::Document;
use docfill_docx::package::Package;
use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, redirect};
use serde_json::{Value, json};

const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

fn template() -> Vec<u8> {
    let mut package = Package::default();
    package.put(
        "[Content_Types].xml",
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/></Types>"#.to_vec(),
    );
    package.put(
        "_rels/.rels",
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#.to_vec(),
    );
    package.put(
        "word/document.xml",
        br#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>[LOGO]</w:t></w:r></w:p><w:p><w:r><w:t>Proposta para </w:t></w:r><w:r><w:t>{{NOME_CLIENTE}}</w:t></w:r></w:p><w:p><w:r><w:t>{{VALOR_TOTAL}}</w:t></w:r></w:p></w:body></w:document>"#.to_vec(),
    );
    package.to_bytes().unwrap()
}

fn png() -> Vec<u8> {
    let mut data = Cursor::new(Vec::new());
    image::RgbImage::new(40, 20)
        .write_to(&mut data, image::ImageFormat::Png)
        .unwrap();
    data.into_inner()
}

async fn start(dir: &Path) -> HttpServer {
    let config = ServerConfig {
        addr: "127.0.0.1:0".into(),
        uploads_dir: dir.join("uploads"),
        default_template: dir.join("template.docx"),
        logo: Default::default(),
        secret_key: b"e2e".to_vec(),
    };
    make_http_server(Arc::new(AppState::new(config).unwrap()))
        .await
        .unwrap()
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(redirect::Policy::none())
        .build()
        .unwrap()
}

async fn stop(server: HttpServer) {
    server.shutdown_tx.send(()).unwrap();
    server.join.await.unwrap();
}

#[tokio::test]
async fn fills_uploaded_template() {
    let dir = tempfile::tempdir().unwrap();
    let server = start(dir.path()).await;

    let form = Form::new()
        .text("NOME_CLIENTE", "Padaria São João")
        .text("VALOR_TOTAL", "R$ 10.000,00")
        .text("NAO_EXISTE", "ignored")
        .part(
            "template_file",
            Part::bytes(template()).file_name("proposta.docx"),
        )
        .part("logo", Part::bytes(png()).file_name("logo.png"));

    let res = client()
        .post(format!("http://{}/gerar", server.addr))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], DOCX);
    let disposition = res.headers()["content-disposition"].to_str().unwrap();
    assert!(disposition.contains("filename*=UTF-8''PROPOSTA_Padaria%20S%C3%A3o%20Jo%C3%A3o_"));

    let data = res.bytes().await.unwrap();
    let doc = Document::from_bytes(&data).unwrap();
    assert!(doc.placeholders().is_empty());

    let package = Package::from_bytes(&data).unwrap();
    assert!(package.contains("word/media/logo1.png"));
    let body = String::from_utf8(package.get("word/document.xml").unwrap().to_vec()).unwrap();
    assert!(body.contains("Proposta para Padaria São João"));
    assert!(body.contains("R$ 10.000,00"));
    assert!(!body.contains("[LOGO]"));

    assert!(dir.path().join("uploads/proposta.docx").is_file());
    assert!(dir.path().join("uploads/logo.png").is_file());

    stop(server).await;
}

#[tokio::test]
async fn missing_template_redirects_back_to_form() {
    let dir = tempfile::tempdir().unwrap();
    let server = start(dir.path()).await;
    let client = client();

    let res = client
        .post(format!("http://{}/gerar", server.addr))
        .multipart(Form::new().text("NOME_CLIENTE", "ACME"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()["location"], "/");
    let cookie = res.headers()["set-cookie"].to_str().unwrap();
    let cookie = cookie.split(';').next().unwrap().to_owned();

    let res = client
        .get(format!("http://{}/", server.addr))
        .header("cookie", cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let html = res.text().await.unwrap();
    assert!(html.contains("Envie um template .docx"));

    stop(server).await;
}

#[tokio::test]
async fn scan_reads_default_template() {
    let dir = tempfile::tempdir().unwrap();
    let server = start(dir.path()).await;
    let url = format!("http://{}/debug/scan", server.addr);

    let res = client().get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.json::<Value>().await.unwrap()["ok"], json!(false));

    std::fs::write(dir.path().join("template.docx"), template()).unwrap();
    let res = client().get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "ok": true, "placeholders_encontrados": ["NOME_CLIENTE", "VALOR_TOTAL"] })
    );

    stop(server).await;
}
