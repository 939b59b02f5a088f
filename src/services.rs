//! Well-known service names for display.
//!
//! This is a static IANA-style lookup by (protocol, port). Nothing here
//! talks to the service; the name is only a label for the results table.

use crate::scanner::Protocol;

/// Services commonly found on a TCP port.
fn tcp_service(port: u16) -> Option<&'static str> {
    let name = match port {
        20 => "ftp-data",
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "domain",
        80 => "http",
        88 => "kerberos",
        110 => "pop3",
        111 => "rpcbind",
        135 => "msrpc",
        139 => "netbios-ssn",
        143 => "imap",
        389 => "ldap",
        443 => "https",
        445 => "microsoft-ds",
        465 => "smtps",
        587 => "submission",
        631 => "ipp",
        636 => "ldaps",
        873 => "rsync",
        993 => "imaps",
        995 => "pop3s",
        1433 => "mssql",
        1521 => "oracle",
        1723 => "pptp",
        1883 => "mqtt",
        2049 => "nfs",
        2375 => "docker",
        3306 => "mysql",
        3389 => "rdp",
        5432 => "postgresql",
        5672 => "amqp",
        5900 => "vnc",
        6379 => "redis",
        6443 => "kubernetes-api",
        8000 | 8008 | 8081 | 8888 => "http-alt",
        8080 => "http-proxy",
        8443 => "https-alt",
        9092 => "kafka",
        9200 => "elasticsearch",
        11211 => "memcached",
        27017 => "mongodb",
        _ => return None,
    };
    Some(name)
}

/// Services commonly found on a UDP port.
fn udp_service(port: u16) -> Option<&'static str> {
    let name = match port {
        53 => "domain",
        67 => "dhcp-server",
        68 => "dhcp-client",
        69 => "tftp",
        123 => "ntp",
        137 => "netbios-ns",
        138 => "netbios-dgm",
        161 => "snmp",
        162 => "snmptrap",
        500 => "isakmp",
        514 => "syslog",
        520 => "rip",
        1194 => "openvpn",
        1701 => "l2tp",
        1812 => "radius",
        1900 => "ssdp",
        4500 => "ipsec-nat-t",
        5060 => "sip",
        5353 => "mdns",
        11211 => "memcached",
        51820 => "wireguard",
        _ => return None,
    };
    Some(name)
}

/// Look up the conventional service name for a port.
pub fn service_name(protocol: Protocol, port: u16) -> Option<&'static str> {
    match protocol {
        Protocol::Tcp => tcp_service(port),
        Protocol::Udp => udp_service(port),
    }
}

/// Service name or "unknown".
pub fn service_label(protocol: Protocol, port: u16) -> &'static str {
    service_name(protocol, port).unwrap_or("unknown")
}
