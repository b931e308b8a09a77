pub fn log_schedule_guidance() {
    #[cfg(windows)]
    const TEMPLATE: &str = r#"schtasks /Create /TN quotamon /SC DAILY /ST 06:30 ^
    /TR "quotamon.exe --config C:\etc\quotamon\quotamon.toml"
"#;

    #[cfg(not(windows))]
    const TEMPLATE: &str = r#"[Unit]
Description=Mailbox quota monitor

[Service]
Type=oneshot
ExecStart=/usr/local/bin/quotamon --config /etc/quotamon/quotamon.toml

# quotamon.timer
[Timer]
OnCalendar=*-*-* 06:30:00
Persistent=true

[Install]
WantedBy=timers.target
"#;

    tracing::debug!(
        template = TEMPLATE,
        "platform-specific schedule descriptor available"
    );
}
