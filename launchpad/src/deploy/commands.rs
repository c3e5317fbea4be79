//! Remote command plans for setting up and updating an instance

use secrecy::ExposeSecret;

use crate::models::config::DeploymentConfig;

/// Directory every application is checked out to
const APP_ROOT: &str = "/opt";

/// One command of a plan
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    /// Milestone message shown before the command runs
    pub description: String,

    /// What is actually executed; may contain secrets
    pub command: String,

    /// What is logged and published
    pub display: String,
}

impl RemoteCommand {
    fn new(description: impl Into<String>, command: impl Into<String>) -> Self {
        let command = command.into();
        Self {
            description: description.into(),
            display: command.clone(),
            command,
        }
    }

    fn redacted(
        description: impl Into<String>,
        command: impl Into<String>,
        display: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            command: command.into(),
            display: display.into(),
        }
    }
}

/// Quote a value for a POSIX shell
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Checkout directory of a project on the instance
pub fn app_dir(config: &DeploymentConfig) -> String {
    format!("{}/{}", APP_ROOT, config.project_name())
}

/// Repository URL to fetch from, and the same URL safe to display.
///
/// A repository token is injected as https basic-auth credentials; scp-like
/// references are used as they are.
fn fetch_urls(config: &DeploymentConfig) -> (String, String) {
    let public = config.repository_url.trim().to_string();

    let Some(token) = config.credentials.repository_token.as_ref() else {
        return (public.clone(), public);
    };

    match url::Url::parse(&public) {
        Ok(mut url) if url.scheme() == "https" || url.scheme() == "http" => {
            let injected = url.set_username("x-access-token").is_ok()
                && url.set_password(Some(token.expose_secret())).is_ok();
            if injected {
                (url.to_string(), public)
            } else {
                (public.clone(), public)
            }
        }
        _ => (public.clone(), public),
    }
}

fn install_step(config: &DeploymentConfig, dir: &str) -> Option<RemoteCommand> {
    config
        .install_command
        .as_deref()
        .map(str::trim)
        .filter(|cmd| !cmd.is_empty())
        .map(|cmd| RemoteCommand::new("Installing dependencies", format!("cd {} && {}", dir, cmd)))
}

fn service_unit(config: &DeploymentConfig, dir: &str) -> String {
    let start = config
        .start_command
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    format!(
        "[Unit]\n\
         Description={name}\n\
         After=network.target\n\
         \n\
         [Service]\n\
         WorkingDirectory={dir}\n\
         Environment=PORT={port}\n\
         ExecStart=/bin/bash -lc \"{start}\"\n\
         Restart=always\n\
         RestartSec=3\n\
         \n\
         [Install]\n\
         WantedBy=multi-user.target\n",
        name = config.project_name(),
        dir = dir,
        port = config.app_port,
        start = start,
    )
}

fn nginx_site(config: &DeploymentConfig) -> String {
    format!(
        "server {{\n\
         \x20   listen 80;\n\
         \x20   server_name {hostname};\n\
         \n\
         \x20   location / {{\n\
         \x20       proxy_pass http://127.0.0.1:{port};\n\
         \x20       proxy_http_version 1.1;\n\
         \x20       proxy_set_header Upgrade $http_upgrade;\n\
         \x20       proxy_set_header Connection \"upgrade\";\n\
         \x20       proxy_set_header Host $host;\n\
         \x20       proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;\n\
         \x20       proxy_set_header X-Forwarded-Proto $scheme;\n\
         \x20   }}\n\
         }}\n",
        hostname = config.requested_hostname(),
        port = config.app_port,
    )
}

/// Ordered commands that turn a fresh instance into a running deployment
pub fn setup_commands(config: &DeploymentConfig) -> Vec<RemoteCommand> {
    let project = config.project_name();
    let dir = app_dir(config);
    let branch = shell_quote(config.branch.trim());
    let (fetch_url, public_url) = fetch_urls(config);

    let mut commands = vec![
        RemoteCommand::new(
            "Updating package index",
            "sudo DEBIAN_FRONTEND=noninteractive apt-get update -y",
        ),
        RemoteCommand::new(
            "Installing git and nginx",
            "sudo DEBIAN_FRONTEND=noninteractive apt-get install -y git nginx",
        ),
        RemoteCommand::redacted(
            "Cloning repository",
            format!(
                "sudo rm -rf {dir} && sudo mkdir -p {dir} && sudo chown \"$(id -u):$(id -g)\" {dir} \
                 && git clone --depth 1 --branch {branch} {url} {dir} \
                 && git -C {dir} remote set-url origin {public}",
                dir = dir,
                branch = branch,
                url = shell_quote(&fetch_url),
                public = shell_quote(&public_url),
            ),
            format!(
                "git clone --depth 1 --branch {} {} {}",
                branch,
                shell_quote(&public_url),
                dir
            ),
        ),
    ];

    commands.extend(install_step(config, &dir));

    commands.push(RemoteCommand::new(
        "Writing service unit",
        format!(
            "sudo tee /etc/systemd/system/{project}.service > /dev/null <<'UNIT'\n{unit}UNIT",
            project = project,
            unit = service_unit(config, &dir),
        ),
    ));
    commands.push(RemoteCommand::new(
        "Configuring reverse proxy",
        format!(
            "sudo tee /etc/nginx/sites-available/{project} > /dev/null <<'SITE'\n{site}SITE\n\
             sudo ln -sf /etc/nginx/sites-available/{project} /etc/nginx/sites-enabled/{project} \
             && sudo rm -f /etc/nginx/sites-enabled/default",
            project = project,
            site = nginx_site(config),
        ),
    ));
    commands.push(RemoteCommand::new(
        "Starting application service",
        format!(
            "sudo systemctl daemon-reload && sudo systemctl enable --now {}.service",
            project
        ),
    ));
    commands.push(RemoteCommand::new(
        "Restarting nginx",
        "sudo nginx -t && sudo systemctl restart nginx",
    ));

    commands
}

/// Ordered commands that update a running deployment to the latest source
pub fn redeploy_commands(config: &DeploymentConfig) -> Vec<RemoteCommand> {
    let project = config.project_name();
    let dir = app_dir(config);
    let branch = shell_quote(config.branch.trim());
    let (fetch_url, public_url) = fetch_urls(config);

    let mut commands = vec![RemoteCommand::redacted(
        "Pulling latest source",
        format!(
            "git -C {dir} fetch --depth 1 {url} {branch} && git -C {dir} reset --hard FETCH_HEAD",
            dir = dir,
            url = shell_quote(&fetch_url),
            branch = branch,
        ),
        format!(
            "git -C {dir} fetch --depth 1 {url} {branch} && git -C {dir} reset --hard FETCH_HEAD",
            dir = dir,
            url = shell_quote(&public_url),
            branch = branch,
        ),
    )];

    commands.extend(install_step(config, &dir));

    commands.push(RemoteCommand::new(
        "Restarting application service",
        format!("sudo systemctl restart {}.service", project),
    ));
    commands.push(RemoteCommand::new(
        "Restarting nginx",
        "sudo systemctl restart nginx",
    ));

    commands
}
