//! Server-rendered HTML for the upload form and the results view.

use crate::scanner::{BatchReport, SUPPORTED_EXTENSIONS};
use std::fmt::Write;

const APP_TITLE: &str = "Plaga Scan 🍅";

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 0 auto; max-width: 1100px; padding: 1rem 2rem; }
h1 { text-align: center; }
.steps { font-size: 18px; text-align: justify; }
.result { margin: 2rem 0; }
.result img { width: 100%; max-width: 680px; display: block; }
.caption { color: #666; font-size: 14px; }
.error { color: #b00020; font-weight: bold; }
.download { display: inline-block; margin: 1rem 0; padding: .6rem 1.2rem; background: #d33; color: #fff; text-decoration: none; border-radius: 4px; }
"#;

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>Tomato Pest Detection</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <h1>{APP_TITLE}</h1>\n{body}\n</body>\n</html>\n"
    )
}

fn upload_form(max_upload_mb: usize) -> String {
    let accept = SUPPORTED_EXTENSIONS
        .iter()
        .map(|e| format!(".{}", e))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        r#"<div class="steps">
<p><b>Follow these steps.</b></p>
<ol>
<li><b>Upload only tomato-leaf images to find out whether they are affected by the Tuta absoluta pest.</b></li>
<li><b>Image upload:</b> select one or several images from your device (up to {max_upload_mb} MB in total).</li>
<li><b>Image analysis:</b> the analysed images are shown with the detected pests and their accuracy.</li>
<li><b>PDF report:</b> download a PDF with the results and the processed images.</li>
</ol>
</div>
<form action="/analyze" method="post" enctype="multipart/form-data">
<input type="file" name="images" accept="{accept}" multiple required>
<button type="submit">Analyse</button>
</form>"#
    )
}

pub fn upload_page(max_upload_mb: usize) -> String {
    layout(&upload_form(max_upload_mb))
}

pub fn results_page(report: &BatchReport, max_upload_mb: usize) -> String {
    let mut body = upload_form(max_upload_mb);
    let batch = report.batch_id.to_string();

    for image in &report.images {
        let _ = write!(
            body,
            "\n<div class=\"result\">\n<img src=\"/reports/{}/images/{}\" alt=\"{}\">\n\
             <div class=\"caption\">Processed image: {}</div>\n",
            batch,
            escape_html(&image.annotated_name),
            escape_html(&image.source_name),
            escape_html(&image.source_name),
        );
        if image.detections.is_empty() {
            body.push_str("<p>No pests detected</p>\n");
        }
        for detection in &image.detections {
            let _ = writeln!(
                body,
                "<p><b>Pest:</b> {}, <b>Accuracy:</b> {}%</p>",
                escape_html(&detection.pest),
                detection.accuracy
            );
        }
        body.push_str("</div>");
    }

    let _ = write!(
        body,
        "\n<a class=\"download\" href=\"/reports/{}/report.pdf\" download=\"{}\">Download PDF report</a>",
        batch,
        escape_html(&report.report_name)
    );

    layout(&body)
}

pub fn error_page(message: &str, max_upload_mb: usize) -> String {
    let body = format!(
        "{}\n<p class=\"error\">{}</p>",
        upload_form(max_upload_mb),
        escape_html(message)
    );
    layout(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{PestDetection, ScannedImage};
    use crate::storage::BatchId;
    use leaf_detection::BoundingBox;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"x\" & 'y'</b>"),
            "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_upload_page_has_multi_file_form() {
        let page = upload_page(20);
        assert!(page.contains("enctype=\"multipart/form-data\""));
        assert!(page.contains("accept=\".jpg,.jpeg,.png\""));
        assert!(page.contains("multiple"));
        assert!(page.contains("Plaga Scan"));
    }

    #[test]
    fn test_results_page() {
        let batch_id = BatchId::new();
        let report = BatchReport {
            batch_id,
            report_name: "pest_report.pdf".to_string(),
            images: vec![
                ScannedImage {
                    source_name: "<leaf>.png".to_string(),
                    stored_name: "_leaf_.png".to_string(),
                    annotated_name: "_leaf__annotated.jpg".to_string(),
                    width: 340,
                    height: 340,
                    detections: vec![PestDetection {
                        pest: "tuta_absoluta".to_string(),
                        class_id: 0,
                        accuracy: 91.25,
                        bbox: BoundingBox {
                            class_id: 0,
                            confidence: 0.9125,
                            x1: 0.,
                            y1: 0.,
                            x2: 10.,
                            y2: 10.,
                        },
                    }],
                    annotated_jpeg: Vec::new(),
                },
                ScannedImage {
                    source_name: "clean.jpg".to_string(),
                    stored_name: "clean.jpg".to_string(),
                    annotated_name: "clean_annotated.jpg".to_string(),
                    width: 340,
                    height: 340,
                    detections: Vec::new(),
                    annotated_jpeg: Vec::new(),
                },
            ],
        };

        let page = results_page(&report, 20);
        assert!(page.contains(&format!("/reports/{}/images/_leaf__annotated.jpg", batch_id)));
        assert!(page.contains("&lt;leaf&gt;.png"));
        assert!(!page.contains("<leaf>"));
        assert!(page.contains("<b>Pest:</b> tuta_absoluta, <b>Accuracy:</b> 91.25%"));
        assert!(page.contains("No pests detected"));
        assert!(page.contains(&format!("/reports/{}/report.pdf", batch_id)));
    }

    #[test]
    fn test_error_page_escapes_message() {
        let page = error_page("bad <file>", 20);
        assert!(page.contains("bad &lt;file&gt;"));
    }
}
