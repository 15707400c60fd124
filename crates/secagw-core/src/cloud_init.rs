//! Cloud-init user data for NAT-backed internet gateways
//!
//! The backing instance forwards IPv4 traffic from its private networks and
//! masquerades it out of the default egress interface. The script is safe to
//! run repeatedly: every iptables rule is checked with `-C` before `-A`.

/// Idempotent NAT setup script installed on the backing instance
pub const NAT_SETUP_SCRIPT: &str = r#"#!/bin/sh
set -e

sysctl -w net.ipv4.ip_forward=1

EGRESS_IF=$(ip -4 route show default | awk '{print $5; exit}')
if [ -z "$EGRESS_IF" ]; then
    echo "seca-nat: no default route, nothing to do" >&2
    exit 1
fi

iptables -t nat -C POSTROUTING -o "$EGRESS_IF" -j MASQUERADE 2>/dev/null \
    || iptables -t nat -A POSTROUTING -o "$EGRESS_IF" -j MASQUERADE
iptables -C FORWARD -i "$EGRESS_IF" -m conntrack --ctstate RELATED,ESTABLISHED -j ACCEPT 2>/dev/null \
    || iptables -A FORWARD -i "$EGRESS_IF" -m conntrack --ctstate RELATED,ESTABLISHED -j ACCEPT
iptables -C FORWARD ! -i "$EGRESS_IF" -o "$EGRESS_IF" -j ACCEPT 2>/dev/null \
    || iptables -A FORWARD ! -i "$EGRESS_IF" -o "$EGRESS_IF" -j ACCEPT
"#;

const SCRIPT_PATH: &str = "/usr/local/sbin/seca-nat.sh";
const SYSCTL_PATH: &str = "/etc/sysctl.d/99-seca-nat.conf";

/// `#cloud-config` document for a gateway's backing instance
pub fn nat_user_data() -> String {
    let mut doc = String::from("#cloud-config\nwrite_files:\n");

    doc.push_str(&format!("  - path: {}\n", SYSCTL_PATH));
    doc.push_str("    permissions: '0644'\n");
    doc.push_str("    content: |\n");
    doc.push_str("      net.ipv4.ip_forward = 1\n");

    doc.push_str(&format!("  - path: {}\n", SCRIPT_PATH));
    doc.push_str("    permissions: '0755'\n");
    doc.push_str("    content: |\n");
    for line in NAT_SETUP_SCRIPT.lines() {
        if line.is_empty() {
            doc.push('\n');
        } else {
            doc.push_str("      ");
            doc.push_str(line);
            doc.push('\n');
        }
    }

    doc.push_str("runcmd:\n");
    doc.push_str(&format!("  - [ sh, {} ]\n", SCRIPT_PATH));
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_data_is_cloud_config() {
        let doc = nat_user_data();
        assert!(doc.starts_with("#cloud-config\n"));
        assert!(doc.contains("net.ipv4.ip_forward = 1"));
        assert!(doc.contains("runcmd:\n  - [ sh, /usr/local/sbin/seca-nat.sh ]"));
    }

    #[test]
    fn test_every_append_is_guarded_by_check() {
        let appends = NAT_SETUP_SCRIPT.matches("iptables -A").count()
            + NAT_SETUP_SCRIPT.matches("iptables -t nat -A").count();
        let checks = NAT_SETUP_SCRIPT.matches("iptables -C").count()
            + NAT_SETUP_SCRIPT.matches("iptables -t nat -C").count();
        assert_eq!(appends, 3);
        assert_eq!(appends, checks);
        assert!(NAT_SETUP_SCRIPT.contains("MASQUERADE"));
    }

    #[test]
    fn test_script_lines_are_indented_under_content() {
        let doc = nat_user_data();
        assert!(doc.contains("    content: |\n      #!/bin/sh\n"));
    }
}
