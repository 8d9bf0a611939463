use serde_json::{json, Value};

use super::ComponentDefaults;

/// `ec2-instance`: a single virtual machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ec2Instance;

impl ComponentDefaults for Ec2Instance {
    fn component_type(&self) -> &'static str {
        "ec2-instance"
    }

    fn fallback(&self) -> Value {
        json!({
            "instanceType": "t3.micro",
            "ami": {"osFamily": "amazon-linux-2023"},
            "storage": {"sizeGb": 8, "volumeType": "gp3", "encrypted": false},
            "security": {
                "requireImdsv2": false,
                "securityGroupIds": [],
                "associatePublicIp": false
            },
            "monitoring": {"detailed": false, "alarmsEnabled": false},
            "tags": {}
        })
    }
}
