//! Built-in template definitions.
//!
//! `default.title` and `default.message` are what every channel renders
//! unless a channel setting points at another template.

pub const DEFAULT_TEMPLATES: &str = r#"
{{ define "__subject" }}[{{ .Status | toUpper }}{{ if eq .Status "firing" }}:{{ .FiringAlerts | len }}{{ end }}] {{ .CommonLabels | join " " }}{{ end }}

{{ define "__text_alert_list" }}{{ range . }}Labels:
{{ range .LabelPairs }} - {{ . }}
{{ end }}{{ if .AnnotationPairs }}Annotations:
{{ range .AnnotationPairs }} - {{ . }}
{{ end }}{{ end }}{{ if .GeneratorURL }}Source: {{ .GeneratorURL }}
{{ end }}
{{ end }}{{ end }}

{{ define "default.title" }}{{ template "__subject" . }}{{ end }}

{{ define "default.message" }}{{ if .FiringAlerts }}**Firing**

{{ template "__text_alert_list" .FiringAlerts }}{{ end }}{{ if .ResolvedAlerts }}**Resolved**

{{ template "__text_alert_list" .ResolvedAlerts }}{{ end }}{{ end }}
"#;
