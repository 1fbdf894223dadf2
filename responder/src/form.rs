/// Maximum length of a rejection reason accepted by the form.
pub const REASON_MAX_LEN: usize = 500;

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Page asking a respondent who rejected for the reason. Submitting it sends
/// a new request to `action` with the same `id` and `status=rechazado`.
pub fn render_reason_form(id: &str, action: &str) -> String {
    let id = escape_html(id);
    let action = escape_html(action);

    format!(
        r#"<!doctype html>
<html lang="es"><head>
<meta charset="utf-8"/>
<meta name="viewport" content="width=device-width,initial-scale=1"/>
<title>Cuéntanos el motivo</title>
<style>
  body{{font-family:Arial,system-ui,-apple-system;background:#fafafa;margin:0}}
  .wrap{{max-width:680px;margin:48px auto;padding:0 16px}}
  .card{{background:#fff;border-radius:14px;box-shadow:0 8px 28px rgba(0,0,0,.08);padding:28px 24px}}
  h1{{margin:0 0 8px}}
  p{{color:#333;margin:0 0 18px}}
  form{{display:grid;gap:12px}}
  label{{font-weight:700}}
  textarea{{width:100%;min-height:120px;padding:10px;border-radius:10px;border:1px solid #ddd;font-family:inherit}}
  button{{padding:12px 16px;border-radius:10px;border:0;cursor:pointer}}
</style>
</head>
<body>
  <div class="wrap">
    <div class="card">
      <h1>😕 Entendido, ¿nos cuentas por qué?</h1>
      <p>Tu respuesta nos ayuda a mejorar el servicio.</p>
      <form action="{action}" method="GET">
        <input type="hidden" name="id" value="{id}"/>
        <input type="hidden" name="status" value="rechazado"/>
        <label for="motivo">Motivo</label>
        <textarea id="motivo" name="motivo" required maxlength="{REASON_MAX_LEN}" placeholder="Escribe el motivo..."></textarea>
        <button type="submit">Enviar</button>
      </form>
    </div>
  </div>
</body></html>"#
    )
}
